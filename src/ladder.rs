/// Heights at or below this are treated as degenerate probe output
pub(crate) const MIN_DIMENSION: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub(crate) struct Dimension {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Tier {
    pub(crate) name: &'static str,
    pub(crate) dimension: Dimension,
}

/// Position of a tier within [`LADDER`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TierIndex(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TierSearch {
    Found(TierIndex),
    Exhausted,
    Invalid(InvalidHeight),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Height {0} is too small to place on the ladder")]
pub(crate) struct InvalidHeight(pub(crate) u32);

const fn tier(name: &'static str, width: u32, height: u32) -> Tier {
    Tier {
        name,
        dimension: Dimension { width, height },
    }
}

// Descending by height, canonical sizes assume 16:9
pub(crate) const LADDER: &[Tier] = &[
    tier("2160p", 3840, 2160),
    tier("1440p", 2560, 1440),
    tier("1080p", 1920, 1080),
    tier("720p", 1280, 720),
    tier("480p", 854, 480),
    tier("360p", 640, 360),
    tier("240p", 426, 240),
];

const DEFAULT_LOW_TIER: TierIndex = TierIndex(LADDER.len() - 1);

impl Dimension {
    pub(crate) const fn new(width: u32, height: u32) -> Self {
        Dimension { width, height }
    }

    pub(crate) const fn is_degenerate(&self) -> bool {
        self.width <= MIN_DIMENSION || self.height <= MIN_DIMENSION
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl TierIndex {
    pub(crate) fn tier(self) -> &'static Tier {
        &LADDER[self.0]
    }
}

/// Pick the single downscale target for a source of the given height
///
/// The top tier is never returned: sources at or above it land on the second entry, and
/// everything else lands on the nearest tier strictly below its own height.
pub(crate) fn nearest_lower_tier(native_height: u32) -> TierSearch {
    if native_height <= MIN_DIMENSION {
        return TierSearch::Invalid(InvalidHeight(native_height));
    }

    if native_height >= LADDER[0].dimension.height {
        return next_lower_tier(TierIndex(0));
    }

    LADDER
        .iter()
        .position(|tier| tier.dimension.height < native_height)
        .map(TierIndex)
        .map_or(TierSearch::Found(DEFAULT_LOW_TIER), TierSearch::Found)
}

/// Step one notch further down the ladder
pub(crate) fn next_lower_tier(current: TierIndex) -> TierSearch {
    let next = current.0 + 1;

    if next < LADDER.len() {
        TierSearch::Found(TierIndex(next))
    } else {
        TierSearch::Exhausted
    }
}

pub(crate) fn dimension_for_tier(index: TierIndex) -> Option<Dimension> {
    LADDER.get(index.0).map(|tier| tier.dimension)
}

#[cfg(test)]
mod tests {
    use super::{
        dimension_for_tier, nearest_lower_tier, next_lower_tier, Dimension, InvalidHeight,
        TierIndex, TierSearch, LADDER,
    };

    fn found_name(search: TierSearch) -> &'static str {
        match search {
            TierSearch::Found(index) => index.tier().name,
            other => panic!("Expected a tier, got {other:?}"),
        }
    }

    #[test]
    fn tallest_and_above_select_second_entry() {
        for height in [2160, 2161, 4320, u32::MAX] {
            assert_eq!(found_name(nearest_lower_tier(height)), "1440p");
        }
    }

    #[test]
    fn never_selects_top_tier() {
        for height in 11..5000 {
            if let TierSearch::Found(index) = nearest_lower_tier(height) {
                assert_ne!(index, TierIndex(0), "height {height}");
                assert!(index.tier().dimension.height <= LADDER[0].dimension.height);
            }
        }
    }

    #[test]
    fn between_tiers_selects_strictly_lower() {
        assert_eq!(found_name(nearest_lower_tier(1080)), "720p");
        assert_eq!(found_name(nearest_lower_tier(1079)), "720p");
        assert_eq!(found_name(nearest_lower_tier(1081)), "1080p");
        assert_eq!(found_name(nearest_lower_tier(2159)), "1440p");
        assert_eq!(found_name(nearest_lower_tier(720)), "480p");
        assert_eq!(found_name(nearest_lower_tier(481)), "480p");
        assert_eq!(found_name(nearest_lower_tier(361)), "360p");
        assert_eq!(found_name(nearest_lower_tier(300)), "240p");
    }

    #[test]
    fn tiny_sources_select_default_tier() {
        assert_eq!(found_name(nearest_lower_tier(240)), "240p");
        assert_eq!(found_name(nearest_lower_tier(144)), "240p");
        assert_eq!(found_name(nearest_lower_tier(11)), "240p");
    }

    #[test]
    fn degenerate_heights_are_invalid() {
        assert_eq!(nearest_lower_tier(10), TierSearch::Invalid(InvalidHeight(10)));
        assert_eq!(nearest_lower_tier(0), TierSearch::Invalid(InvalidHeight(0)));
    }

    #[test]
    fn stepping_past_the_last_tier_is_exhausted() {
        let last = TierIndex(LADDER.len() - 1);

        assert_eq!(next_lower_tier(TierIndex(0)), TierSearch::Found(TierIndex(1)));
        assert_eq!(next_lower_tier(last), TierSearch::Exhausted);
    }

    #[test]
    fn dimensions_for_tiers() {
        let TierSearch::Found(index) = nearest_lower_tier(1080) else {
            panic!("Expected tier");
        };

        assert_eq!(dimension_for_tier(index), Some(Dimension::new(1280, 720)));
        assert_eq!(dimension_for_tier(TierIndex(LADDER.len())), None);
    }

    #[test]
    fn degenerate_dimensions() {
        assert!(Dimension::new(5, 5).is_degenerate());
        assert!(Dimension::new(1920, 10).is_degenerate());
        assert!(!Dimension::new(11, 11).is_degenerate());
    }
}
