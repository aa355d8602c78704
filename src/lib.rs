#[cfg(test)]
macro_rules! test_async {
    ($fut:expr) => {
        actix_web::rt::System::new()
            .block_on(async move { actix_web::rt::spawn($fut).await.unwrap() })
    };
}

mod config;
mod error;
mod error_code;
mod events;
mod ffmpeg;
mod formats;
mod future;
mod ingest;
mod init_tracing;
mod ladder;
mod path;
mod pipeline;
mod probe;
mod process;
mod state;
mod store;
mod tmp_file;

use actix_form_data::{Field, Form, FormData, Multipart, Value};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use futures_util::TryStreamExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use std::{marker::PhantomData, path::Path, sync::Arc, time::Duration};
use tokio::io::AsyncReadExt;
use tracing::Instrument;
use tracing_actix_web::TracingLogger;

use self::{
    config::{Configuration, Operation},
    error::{Error, UploadError},
    events::Notification,
    ffmpeg::{FfMpeg, Transcoder},
    ingest::Spooled,
    init_tracing::init_tracing,
    pipeline::{Asset, Outcome},
    process::ProcessLimiter,
    state::State,
    store::{object_store::ObjectStore, Store},
    tmp_file::TmpDir,
};

pub use self::config::{ConfigSource, VodConfiguration};

const MEGABYTES: usize = 1024 * 1024;

const SUCCESS_MSG: &str = "Successfully processed data";

fn max_bytes(config: &Configuration) -> u64 {
    (config.media.max_file_size as u64).saturating_mul(MEGABYTES as u64)
}

fn processed(outcome: &Outcome) -> HttpResponse {
    tracing::debug!("Wrote {} artifacts under {}", outcome.written.len(), outcome.prefix);

    HttpResponse::Ok().json(&serde_json::json!({
        "msg": SUCCESS_MSG,
    }))
}

struct Upload<S, T>(Value<Spooled>, PhantomData<(S, T)>);

impl<S, T> FormData for Upload<S, T>
where
    S: Store + 'static,
    T: Transcoder + Clone + 'static,
{
    type Item = Spooled;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        let state = req
            .app_data::<web::Data<State<S, T>>>()
            .expect("No state in request")
            .clone();

        let tmp_dir = state.tmp_dir.clone();
        let max_bytes = max_bytes(&state.config);

        // A single file under the field 'upload'
        Ok(Form::new()
            .max_files(1)
            .max_file_size(state.config.media.max_file_size.saturating_mul(MEGABYTES))
            .transform_error(transform_error)
            .field(
                "upload",
                Field::file(move |filename, _, stream| {
                    let tmp_dir = tmp_dir.clone();

                    metrics::counter!("vod.files", "upload" => "multipart").increment(1);

                    let span = tracing::info_span!("file-upload", ?filename);

                    let stream = stream.map_err(Error::from);

                    Box::pin(
                        async move { ingest::spool(&tmp_dir, stream, max_bytes).await }
                            .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(Upload(value, PhantomData))
    }
}

/// Media sent as the raw request body
#[tracing::instrument(name = "Processing media", skip_all)]
async fn gem<S: Store + 'static, T: Transcoder + 'static>(
    body: web::Payload,
    state: web::Data<State<S, T>>,
) -> Result<HttpResponse, Error> {
    metrics::counter!("vod.files", "upload" => "body").increment(1);

    let spooled = ingest::spool(&state.tmp_dir, body.map_err(Error::from), max_bytes(&state.config))
        .await?;

    let outcome = pipeline::process_media(&state, Asset::uploaded(spooled)).await?;

    Ok(processed(&outcome))
}

/// Media sent as a multipart form
#[tracing::instrument(name = "Processing uploaded media", skip_all)]
async fn gem_form<S: Store + 'static, T: Transcoder + Clone + 'static>(
    Multipart(Upload(value, _)): Multipart<Upload<S, T>>,
    state: web::Data<State<S, T>>,
) -> Result<HttpResponse, Error> {
    let spooled = value
        .map()
        .and_then(|mut m| m.remove("upload"))
        .and_then(|upload| upload.file())
        .ok_or(UploadError::NoFiles)?
        .result;

    let outcome = pipeline::process_media(&state, Asset::uploaded(spooled)).await?;

    Ok(processed(&outcome))
}

#[derive(Debug, serde::Deserialize)]
struct UrlQuery {
    #[serde(default)]
    url: Option<String>,
}

fn is_remote(reference: &str) -> bool {
    url::Url::parse(reference).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Media referenced by URL, or by key in the input bucket
#[tracing::instrument(name = "Processing referenced media", skip(state))]
async fn gem_url<S: Store + 'static, T: Transcoder + 'static>(
    query: web::Query<UrlQuery>,
    state: web::Data<State<S, T>>,
) -> Result<HttpResponse, Error> {
    let reference = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or(UploadError::MissingUrl)?;

    let asset = if is_remote(reference) {
        metrics::counter!("vod.files", "upload" => "download").increment(1);

        let stream = download_stream(&state.client, reference).await?;
        let spooled = ingest::spool(&state.tmp_dir, stream, max_bytes(&state.config)).await?;

        Asset::uploaded(spooled)
    } else {
        metrics::counter!("vod.files", "upload" => "bucket").increment(1);

        let bucket = &state.config.buckets.input;
        let bytes = state.store.download(bucket, reference).await?;
        let spooled = ingest::spool_bytes(&state.tmp_dir, bytes, max_bytes(&state.config)).await?;

        Asset::stored(spooled, bucket, reference)
    };

    let outcome = pipeline::process_media(&state, asset).await?;

    Ok(processed(&outcome))
}

async fn download_stream(
    client: &ClientWithMiddleware,
    url: &str,
) -> Result<impl futures_core::Stream<Item = Result<web::Bytes, Error>> + 'static, Error> {
    let res = client.get(url).send().await?;

    if !res.status().is_success() {
        return Err(UploadError::Download(res.status()).into());
    }

    Ok(res.bytes_stream().map_err(Error::from))
}

/// Catalogue image sent as the raw request body
#[tracing::instrument(name = "Processing catalogue image", skip_all)]
async fn catalogue<S: Store + 'static, T: Transcoder + 'static>(
    body: web::Payload,
    state: web::Data<State<S, T>>,
) -> Result<HttpResponse, Error> {
    metrics::counter!("vod.files", "upload" => "catalogue").increment(1);

    let spooled = ingest::spool(&state.tmp_dir, body.map_err(Error::from), max_bytes(&state.config))
        .await?;

    let outcome = pipeline::process_catalogue(&state, Asset::uploaded(spooled)).await?;

    Ok(processed(&outcome))
}

/// Bucket notification delivered over http
#[tracing::instrument(name = "Handling storage event", skip_all)]
async fn storage_event<S: Store + 'static, T: Transcoder + 'static>(
    body: web::Bytes,
    state: web::Data<State<S, T>>,
) -> Result<HttpResponse, Error> {
    let notification = Notification::from_slice(&body)?;

    let outcomes = events::handle(&state, notification).await?;

    tracing::debug!("Processed {} objects", outcomes.len());

    Ok(HttpResponse::Ok().json(&serde_json::json!({
        "msg": SUCCESS_MSG,
    })))
}

async fn ping() -> &'static str {
    "pong"
}

async fn healthz<S: Store + 'static, T: 'static>(state: web::Data<State<S, T>>) -> Result<HttpResponse, Error> {
    state.store.health_check().await?;
    Ok(HttpResponse::Ok().finish())
}

fn transform_error(error: actix_form_data::Error) -> actix_web::Error {
    let error: Error = error.into();
    let error: actix_web::Error = error.into();
    error
}

fn tls_config() -> Result<rustls::ClientConfig, Error> {
    let roots = rustls::RootCertStore {
        roots: Vec::from(webpki_roots::TLS_SERVER_ROOTS),
    };

    let config =
        rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

    Ok(config)
}

fn build_client(config: &Configuration) -> Result<ClientWithMiddleware, Error> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("vod-rs v", env!("CARGO_PKG_VERSION")))
        .use_preconfigured_tls(tls_config()?)
        .pool_max_idle_per_host(config.client.pool_size)
        .timeout(Duration::from_secs(config.client.timeout))
        .build()
        .map_err(UploadError::BuildClient)?;

    Ok(ClientBuilder::new(client)
        .with(TracingMiddleware::default())
        .build())
}

fn configure_endpoints<S, T>(config: &mut web::ServiceConfig, state: State<S, T>)
where
    S: Store + 'static,
    T: Transcoder + Clone + 'static,
{
    config
        .app_data(web::Data::new(state))
        .route("/ping", web::get().to(ping))
        .route("/healthz", web::get().to(healthz::<S, T>))
        .service(
            web::scope("/findapp")
                .service(
                    web::resource("/gem")
                        .route(web::post().to(gem::<S, T>))
                        .route(web::patch().to(gem_url::<S, T>)),
                )
                .service(web::resource("/gemform").route(web::post().to(gem_form::<S, T>)))
                .service(web::resource("/catalogue").route(web::post().to(catalogue::<S, T>)))
                .service(web::resource("/events").route(web::post().to(storage_event::<S, T>))),
        );
}

async fn launch<S, T>(state: State<S, T>) -> std::io::Result<()>
where
    S: Store + Send + 'static,
    T: Transcoder + Clone + Send + 'static,
{
    let address = state.config.server.address;

    tracing::info!("Starting vod-rs on {address}");

    HttpServer::new(move || {
        let state = state.clone();

        App::new()
            .wrap(TracingLogger::default())
            .configure(move |sc| configure_endpoints(sc, state))
    })
    .bind(address)?
    .run()
    .await
}

/// Handle a single notification from `file`, or stdin when none is given
async fn run_event<S, T>(state: State<S, T>, file: Option<&Path>) -> Result<(), Error>
where
    S: Store,
    T: Transcoder,
{
    let bytes = if let Some(file) = file {
        tokio::fs::read(file).await?
    } else {
        let mut bytes = Vec::new();
        tokio::io::stdin().read_to_end(&mut bytes).await?;
        bytes
    };

    let notification = Notification::from_slice(&bytes)?;

    for outcome in events::handle(&state, notification).await? {
        tracing::info!("Wrote {} artifacts under {}", outcome.written.len(), outcome.prefix);
    }

    Ok(())
}

async fn build_store(config: &Configuration) -> color_eyre::Result<ObjectStore> {
    let input = &config.buckets.input;
    let output = &config.buckets.output;

    let store = match &config.store {
        config::Store::Filesystem(config::Filesystem { path }) => {
            ObjectStore::filesystem(path, input, output).await?
        }
        config::Store::ObjectStorage(storage) => {
            ObjectStore::object_storage(storage, input, output)?
        }
    };

    Ok(store)
}

impl<P: AsRef<Path>, T: serde::Serialize> ConfigSource<P, T> {
    /// Initialize the vod-rs configuration
    ///
    /// This takes an optional save_to path, which the generated configuration will be saved into.
    /// Since every parameter has a default, this is a convenient way to see what is available for
    /// tweaking.
    ///
    /// When running vod-rs as a library, configuration is limited to environment variables and
    /// configuration files. Commandline options are not available.
    ///
    /// ```rust
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     vod_rs::ConfigSource::memory(serde_json::json!({
    ///         "server": {
    ///             "address": "127.0.0.1:8080"
    ///         },
    ///         "buckets": {
    ///             "input": "uploads",
    ///             "output": "renditions"
    ///         },
    ///         "store": {
    ///             "type": "filesystem",
    ///             "path": "./files"
    ///         }
    ///     })).init::<&str>(None)?;
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn init<Q: AsRef<Path>>(self, save_to: Option<Q>) -> color_eyre::Result<VodConfiguration> {
        config::configure_without_clap(self, save_to)
    }
}

impl VodConfiguration {
    /// Build the vod-rs configuration from commandline arguments
    ///
    /// This is probably not useful for 3rd party applications that handle their own commandline
    pub fn build_default() -> color_eyre::Result<Self> {
        config::configure()
    }

    /// Install the default vod-rs tracer
    ///
    /// This is probably not useful for 3rd party applications that install their own tracing
    /// subscribers.
    pub fn install_tracing(self) -> color_eyre::Result<Self> {
        init_tracing(&self.config.tracing)?;
        Ok(self)
    }

    pub fn install_metrics(self) -> color_eyre::Result<Self> {
        if let Some(addr) = self.config.metrics.prometheus_address {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()?;
        }

        Ok(self)
    }

    /// Run the vod-rs application
    pub async fn run(self) -> color_eyre::Result<()> {
        let VodConfiguration { config, operation } = self;

        let tmp_dir = TmpDir::init(&config.server.temporary_directory).await?;
        let client = build_client(&config)?;
        let store = build_store(&config).await?;

        let permits = config
            .media
            .process_concurrency
            .unwrap_or_else(ProcessLimiter::default_permits);

        let transcoder = FfMpeg::new(
            config.media.ffmpeg_path.clone(),
            config.media.ffprobe_path.clone(),
            Duration::from_secs(config.media.process_timeout),
            ProcessLimiter::new(permits),
        );

        let state = State {
            config,
            tmp_dir: tmp_dir.clone(),
            store,
            transcoder,
            client,
        };

        match operation {
            Operation::Run => launch(state).await?,
            Operation::Event { file } => run_event(state, file.as_deref()).await?,
        }

        tmp_dir.cleanup().await?;

        Ok(())
    }
}
