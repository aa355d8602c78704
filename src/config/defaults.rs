use crate::{
    config::primitives::{LogFormat, Targets},
    formats::ThumbnailFormat,
};
use std::{net::SocketAddr, path::PathBuf};

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) struct Defaults {
    server: ServerDefaults,
    client: ClientDefaults,
    tracing: TracingDefaults,
    metrics: MetricsDefaults,
    media: MediaDefaults,
    buckets: BucketDefaults,
    store: StoreDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ServerDefaults {
    address: SocketAddr,
    temporary_directory: PathBuf,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ClientDefaults {
    timeout: u64,
    pool_size: usize,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct TracingDefaults {
    logging: LoggingDefaults,

    opentelemetry: OpenTelemetryDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct LoggingDefaults {
    format: LogFormat,
    targets: Targets,
    log_spans: bool,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetryDefaults {
    service_name: String,
    targets: Targets,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MetricsDefaults {
    prometheus_address: Option<SocketAddr>,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MediaDefaults {
    max_file_size: usize,
    process_timeout: u64,
    ffmpeg_path: String,
    ffprobe_path: String,
    video: VideoDefaults,
    catalogue: CatalogueDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct VideoDefaults {
    thumbnails: Vec<ThumbnailDefaults>,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct CatalogueDefaults {
    thumbnail: ThumbnailDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ThumbnailDefaults {
    name: String,
    width: u32,
    height: u32,
    format: ThumbnailFormat,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct BucketDefaults {
    input: String,
    output: String,
    media_prefix: String,
    catalogue_prefix: String,
    media_root: String,
    catalogue_root: String,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum StoreDefaults {
    Filesystem(FilesystemDefaults),
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct FilesystemDefaults {
    path: PathBuf,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        ServerDefaults {
            address: "0.0.0.0:8080".parse().expect("Valid address string"),
            temporary_directory: std::env::temp_dir(),
        }
    }
}

impl Default for ClientDefaults {
    fn default() -> Self {
        ClientDefaults {
            timeout: 30,
            pool_size: 100,
        }
    }
}

impl Default for LoggingDefaults {
    fn default() -> Self {
        LoggingDefaults {
            format: LogFormat::Normal,
            targets: "info".parse().expect("Valid targets string"),
            log_spans: false,
        }
    }
}

impl Default for OpenTelemetryDefaults {
    fn default() -> Self {
        OpenTelemetryDefaults {
            service_name: String::from("vod-rs"),
            targets: "info".parse().expect("Valid targets string"),
        }
    }
}

impl Default for MediaDefaults {
    fn default() -> Self {
        MediaDefaults {
            max_file_size: 40,
            process_timeout: 60,
            ffmpeg_path: String::from("ffmpeg"),
            ffprobe_path: String::from("ffprobe"),
            video: VideoDefaults::default(),
            catalogue: CatalogueDefaults::default(),
        }
    }
}

impl Default for VideoDefaults {
    fn default() -> Self {
        VideoDefaults {
            thumbnails: vec![ThumbnailDefaults::square("thumb")],
        }
    }
}

impl Default for CatalogueDefaults {
    fn default() -> Self {
        CatalogueDefaults {
            thumbnail: ThumbnailDefaults::square("600"),
        }
    }
}

impl ThumbnailDefaults {
    fn square(name: &str) -> Self {
        ThumbnailDefaults {
            name: String::from(name),
            width: 600,
            height: 600,
            format: ThumbnailFormat::Png,
        }
    }
}

impl Default for BucketDefaults {
    fn default() -> Self {
        BucketDefaults {
            input: String::from("vod-uploads"),
            output: String::from("vod-file-storage"),
            media_prefix: String::from("media/"),
            catalogue_prefix: String::from("catalogue/"),
            media_root: String::from("findappmedia"),
            catalogue_root: String::from("findappcatalogue"),
        }
    }
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self::Filesystem(FilesystemDefaults::default())
    }
}

impl Default for FilesystemDefaults {
    fn default() -> Self {
        Self {
            path: PathBuf::from(String::from("/mnt/vod")),
        }
    }
}
