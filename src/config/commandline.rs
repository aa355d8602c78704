use crate::config::primitives::{Filesystem, LogFormat, Targets};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf};
use url::Url;

impl Args {
    pub(super) fn into_output(self) -> Output {
        let Args {
            config_file,
            log_format,
            log_targets,
            log_spans,
            opentelemetry_url,
            opentelemetry_service_name,
            opentelemetry_targets,
            save_to,
            command,
        } = self;

        let tracing = Tracing {
            logging: Logging {
                format: log_format,
                targets: log_targets,
                log_spans,
            },
            opentelemetry: OpenTelemetry {
                url: opentelemetry_url,
                service_name: opentelemetry_service_name,
                targets: opentelemetry_targets,
            },
        };

        match command {
            Command::Run(Run {
                address,
                temporary_directory,
                client_timeout,
                client_pool_size,
                metrics_prometheus_address,
                media,
                buckets,
                store,
            }) => {
                let server = Server {
                    address,
                    temporary_directory,
                };

                let client = Client {
                    timeout: client_timeout,
                    pool_size: client_pool_size,
                };

                let metrics = Metrics {
                    prometheus_address: metrics_prometheus_address,
                };

                Output {
                    config_format: ConfigFormat {
                        server,
                        client,
                        tracing,
                        metrics,
                        media: media.into(),
                        buckets,
                        store: store.map(RunStore::into_store),
                    },
                    operation: Operation::Run,
                    save_to,
                    config_file,
                }
            }
            Command::Event(Event {
                file,
                media,
                buckets,
            }) => Output {
                config_format: ConfigFormat {
                    tracing,
                    media: media.into(),
                    buckets,
                    ..Default::default()
                },
                operation: Operation::Event { file },
                save_to,
                config_file,
            },
        }
    }
}

pub(super) struct Output {
    pub(super) config_format: ConfigFormat,
    pub(super) operation: Operation,
    pub(super) save_to: Option<PathBuf>,
    pub(super) config_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub(crate) enum Operation {
    Run,
    /// Process one storage notification, read from the file or from stdin
    Event {
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct ConfigFormat {
    server: Server,
    client: Client,
    tracing: Tracing,
    metrics: Metrics,
    media: Media,
    buckets: Buckets,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<Store>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Server {
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<SocketAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporary_directory: Option<PathBuf>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Client {
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pool_size: Option<usize>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Tracing {
    logging: Logging,
    opentelemetry: OpenTelemetry,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Logging {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<LogFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Targets>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    log_spans: bool,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetry {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    targets: Option<Targets>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    prometheus_address: Option<SocketAddr>,
}

#[derive(Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Media {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_file_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ffmpeg_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ffprobe_path: Option<String>,
}

impl From<MediaArgs> for Media {
    fn from(args: MediaArgs) -> Self {
        let MediaArgs {
            media_max_file_size,
            media_process_timeout,
            media_process_concurrency,
            media_ffmpeg_path,
            media_ffprobe_path,
        } = args;

        Media {
            max_file_size: media_max_file_size,
            process_timeout: media_process_timeout,
            process_concurrency: media_process_concurrency,
            ffmpeg_path: media_ffmpeg_path,
            ffprobe_path: media_ffprobe_path,
        }
    }
}

/// Run the vod-rs application
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Args {
    /// Path to the vod-rs configuration file
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Format of logs printed to stdout
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Log levels to print to stdout, respects RUST_LOG formatting
    #[arg(long)]
    log_targets: Option<Targets>,
    /// Whether to log openning and closing of tracing spans to stdout
    #[arg(long)]
    log_spans: bool,

    /// URL to send OpenTelemetry metrics
    #[arg(long)]
    opentelemetry_url: Option<Url>,
    /// Service Name to use for OpenTelemetry
    #[arg(long)]
    opentelemetry_service_name: Option<String>,
    /// Log levels to use for OpenTelemetry, respects RUST_LOG formatting
    #[arg(long)]
    opentelemetry_targets: Option<Targets>,

    /// File to save the current configuration for reproducible runs
    #[arg(long)]
    save_to: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the vod-rs web server
    Run(Run),

    /// Processes a single storage notification and exits
    Event(Event),
}

#[derive(Debug, Parser)]
struct Run {
    /// The address and port to bind the vod-rs web server
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// The temporary directory vod-rs should use when processing media
    #[arg(long)]
    temporary_directory: Option<PathBuf>,

    /// How long (in seconds) the internal HTTP client should wait for responses
    ///
    /// This number defaults to 30
    #[arg(long)]
    client_timeout: Option<u64>,

    /// How many idle connections the internal HTTP client keeps per host
    #[arg(long)]
    client_pool_size: Option<usize>,

    /// Whether to enable the prometheus scrape endpoint
    #[arg(long)]
    metrics_prometheus_address: Option<SocketAddr>,

    #[command(flatten)]
    media: MediaArgs,

    #[command(flatten)]
    buckets: Buckets,

    #[command(subcommand)]
    store: Option<RunStore>,
}

#[derive(Debug, Parser)]
struct Event {
    /// The notification JSON. Read from stdin when omitted
    ///
    /// Storage is taken from the configuration file or the environment
    file: Option<PathBuf>,

    #[command(flatten)]
    media: MediaArgs,

    #[command(flatten)]
    buckets: Buckets,
}

#[derive(Debug, Parser)]
struct MediaArgs {
    /// The maximum size, in megabytes, for all uploaded media
    #[arg(long)]
    media_max_file_size: Option<usize>,

    /// Timeout, in seconds, for any single ffmpeg or ffprobe invocation
    #[arg(long)]
    media_process_timeout: Option<u64>,

    /// How many ffmpeg or ffprobe processes may run at once
    ///
    /// Defaults to one less than the number of CPUs
    #[arg(long)]
    media_process_concurrency: Option<usize>,

    /// Path to the ffmpeg executable
    #[arg(long)]
    media_ffmpeg_path: Option<String>,

    /// Path to the ffprobe executable
    #[arg(long)]
    media_ffprobe_path: Option<String>,
}

#[derive(Debug, Default, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct Buckets {
    /// The bucket uploads and storage notifications come from
    #[arg(long = "input-bucket")]
    #[serde(skip_serializing_if = "Option::is_none")]
    input: Option<String>,

    /// The bucket all generated artifacts are written to
    #[arg(long = "output-bucket")]
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,

    /// Object keys under this prefix in the input bucket are videos
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    media_prefix: Option<String>,

    /// Object keys under this prefix in the input bucket are catalogue images
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    catalogue_prefix: Option<String>,

    /// Output directory for processed videos
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    media_root: Option<String>,

    /// Output directory for processed catalogue images
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    catalogue_root: Option<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
// allow large enum variant - this is an instantiated-once config
#[allow(clippy::large_enum_variant)]
enum Store {
    Filesystem(Filesystem),

    ObjectStorage(ObjectStorage),
}

/// Run vod-rs with the provided storage
#[derive(Debug, Subcommand)]
// allow large enum variant - this is an instantiated-once config
#[allow(clippy::large_enum_variant)]
enum RunStore {
    /// Run vod-rs with filesystem storage
    Filesystem(Filesystem),

    /// Run vod-rs with object storage
    ObjectStorage(ObjectStorage),
}

impl RunStore {
    fn into_store(self) -> Store {
        match self {
            Self::Filesystem(filesystem) => Store::Filesystem(filesystem),
            Self::ObjectStorage(object_storage) => Store::ObjectStorage(object_storage),
        }
    }
}

/// Configuration for Object Storage
#[derive(Clone, Debug, Parser, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ObjectStorage {
    /// The base endpoint for the object storage
    ///
    /// Examples:
    /// - `http://localhost:9000`
    /// - `https://s3.dualstack.eu-west-1.amazonaws.com`
    ///
    /// AWS is used when omitted
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<Url>,

    /// Determines whether to use path style or virtualhost style for accessing objects
    ///
    /// When this is true, objects will be fetched from {endpoint}/{bucket_name}/{object}
    /// When false, objects will be fetched from {bucket_name}.{endpoint}/{object}
    #[arg(short, long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    use_path_style: bool,

    /// The region the buckets are located in
    ///
    /// For minio deployments, this can just be 'minio'
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<String>,

    /// The Access Key for the user accessing the buckets
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    access_key: Option<String>,

    /// The secret key for the user accessing the buckets
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_key: Option<String>,

    /// The session token for accessing the buckets
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<String>,

    /// Whether written artifacts should be publicly readable
    ///
    /// This defaults to true
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    public_read: Option<bool>,

    /// How long a client can wait on an object storage request before giving up (in seconds)
    ///
    /// This defaults to 30 seconds
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    client_timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Args, Operation};

    #[test]
    fn verify_args() {
        Args::command().debug_assert();
    }

    #[test]
    fn event_reads_file() {
        let output = Args::parse_from(["vod-rs", "event", "notification.json"]).into_output();

        assert!(matches!(
            output.operation,
            Operation::Event { file: Some(ref path) } if path.to_str() == Some("notification.json")
        ));
    }

    #[test]
    fn run_collects_overrides() {
        let output = Args::parse_from([
            "vod-rs",
            "--log-format",
            "json",
            "run",
            "--address",
            "127.0.0.1:9000",
            "--input-bucket",
            "incoming",
            "--media-process-timeout",
            "5",
            "object-storage",
            "--region",
            "minio",
            "--use-path-style",
        ])
        .into_output();

        assert!(matches!(output.operation, Operation::Run));

        let value = serde_json::to_value(&output.config_format).unwrap();

        assert_eq!(value["server"]["address"], "127.0.0.1:9000");
        assert_eq!(value["tracing"]["logging"]["format"], "json");
        assert_eq!(value["buckets"]["input"], "incoming");
        assert_eq!(value["media"]["process_timeout"], 5);
        assert_eq!(value["store"]["type"], "object_storage");
        assert_eq!(value["store"]["region"], "minio");
        assert_eq!(value["store"]["use_path_style"], true);
        assert!(value["buckets"].get("output").is_none());
    }
}
