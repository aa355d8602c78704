use crate::{
    config::primitives::{LogFormat, Store, Targets},
    formats::ThumbnailFormat,
    ladder::Dimension,
};
use std::{net::SocketAddr, path::PathBuf};
use url::Url;

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct ConfigFile {
    pub(crate) server: Server,

    pub(crate) client: Client,

    pub(crate) tracing: Tracing,

    #[serde(default)]
    pub(crate) metrics: Metrics,

    pub(crate) media: Media,

    pub(crate) buckets: Buckets,

    pub(crate) store: Store,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Server {
    pub(crate) address: SocketAddr,

    pub(crate) temporary_directory: PathBuf,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Client {
    pub(crate) timeout: u64,

    pub(crate) pool_size: usize,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Tracing {
    pub(crate) logging: Logging,

    pub(crate) opentelemetry: OpenTelemetry,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Logging {
    pub(crate) format: LogFormat,

    pub(crate) targets: Targets,

    pub(crate) log_spans: bool,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) url: Option<Url>,

    pub(crate) service_name: String,

    pub(crate) targets: Targets,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) prometheus_address: Option<SocketAddr>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Media {
    /// Megabytes
    pub(crate) max_file_size: usize,

    /// Seconds
    pub(crate) process_timeout: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) process_concurrency: Option<usize>,

    pub(crate) ffmpeg_path: String,

    pub(crate) ffprobe_path: String,

    pub(crate) video: Video,

    pub(crate) catalogue: Catalogue,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Video {
    pub(crate) thumbnails: Vec<VideoThumbnail>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Catalogue {
    pub(crate) thumbnail: Thumbnail,
}

/// A still frame pulled out of a video
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct VideoThumbnail {
    pub(crate) name: String,

    pub(crate) width: u32,

    pub(crate) height: u32,

    pub(crate) format: ThumbnailFormat,

    /// Seconds into the video. Half the probed duration when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) offset: Option<f64>,
}

impl VideoThumbnail {
    pub(crate) const fn dimension(&self) -> Dimension {
        Dimension::new(self.width, self.height)
    }

    pub(crate) fn suffix(&self) -> String {
        format!("{}{}", self.name, self.format.file_extension())
    }

    /// Where to grab the frame from, clamped to the video
    pub(crate) fn seek_seconds(&self, duration: f64) -> f64 {
        match self.offset {
            Some(offset) => offset.clamp(0.0, duration),
            None => duration / 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Thumbnail {
    /// Stored as `<name><extension>` under the asset prefix
    pub(crate) name: String,

    pub(crate) width: u32,

    pub(crate) height: u32,

    pub(crate) format: ThumbnailFormat,
}

impl Thumbnail {
    pub(crate) const fn dimension(&self) -> Dimension {
        Dimension::new(self.width, self.height)
    }

    pub(crate) fn suffix(&self) -> String {
        format!("{}{}", self.name, self.format.file_extension())
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Buckets {
    /// Where uploads and storage notifications originate
    pub(crate) input: String,

    /// Where every artifact is written
    pub(crate) output: String,

    pub(crate) media_prefix: String,

    pub(crate) catalogue_prefix: String,

    pub(crate) media_root: String,

    pub(crate) catalogue_root: String,
}
