use uuid::Uuid;

/// `<root>/<uuid>`, shared by every artifact derived from one asset
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct AssetPrefix(String);

pub(crate) const ORIGINAL_STEM: &str = "original";

impl AssetPrefix {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn new_asset_prefix(root: &str) -> AssetPrefix {
    let root = root.trim_end_matches('/');
    let id = Uuid::new_v4();

    if root.is_empty() {
        AssetPrefix(id.to_string())
    } else {
        AssetPrefix(format!("{root}/{id}"))
    }
}

pub(crate) fn artifact_path(prefix: &AssetPrefix, suffix: &str) -> String {
    format!("{}/{}", prefix.0, suffix.trim_start_matches('/'))
}

pub(crate) fn original_suffix(extension: &str) -> String {
    format!("{ORIGINAL_STEM}{extension}")
}

pub(crate) fn rendition_suffix(height: u32) -> String {
    format!("{height}.mp4")
}
