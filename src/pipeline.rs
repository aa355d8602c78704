#[cfg(test)]
pub(crate) mod tests;

use actix_web::web::Bytes;

use crate::{
    error::{Error, UploadError},
    ffmpeg::{ArtifactSpec, MediaSource, Transcoder},
    formats::{Classification, InputFormat},
    future::WithMetrics,
    ingest::Spooled,
    ladder::TierSearch,
    path::{artifact_path, new_asset_prefix, original_suffix, rendition_suffix, AssetPrefix},
    state::State,
    store::Store,
};

/// The bucket and key an asset was read from
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Origin {
    pub(crate) bucket: String,
    pub(crate) key: String,
}

/// One inbound media file, owned by a single pipeline run
#[derive(Debug)]
pub(crate) struct Asset {
    spooled: Spooled,
    origin: Option<Origin>,
}

#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) prefix: AssetPrefix,
    pub(crate) written: Vec<String>,
}

impl Asset {
    pub(crate) fn uploaded(spooled: Spooled) -> Self {
        Asset {
            spooled,
            origin: None,
        }
    }

    pub(crate) fn stored(spooled: Spooled, bucket: &str, key: &str) -> Self {
        Asset {
            spooled,
            origin: Some(Origin {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
        }
    }

    fn classify(&self) -> Classification {
        crate::formats::classify(&self.spooled.head)
    }
}

/// Store the original, one downscaled mp4 rendition, and the configured thumbnails
#[tracing::instrument(skip_all, fields(size = asset.spooled.size))]
pub(crate) async fn process_media<S, T>(state: &State<S, T>, asset: Asset) -> Result<Outcome, Error>
where
    S: Store,
    T: Transcoder,
{
    let classification = asset.classify();

    if !classification.is_video {
        tracing::info!("Rejecting {} as media", classification.content_type);
        return Err(UploadError::UnrecognizedFormat.into());
    }

    do_process_media(state, asset, classification)
        .with_metrics("vod.pipeline.duration", "media")
        .await
}

async fn do_process_media<S, T>(
    state: &State<S, T>,
    asset: Asset,
    classification: Classification,
) -> Result<Outcome, Error>
where
    S: Store,
    T: Transcoder,
{
    let source = MediaSource::file(&asset.spooled.file);

    let dimension = state.transcoder.probe_dimension(&source).await?;
    let duration = state.transcoder.probe_duration(&source).await?;

    tracing::debug!("Probed {dimension}, {duration:.3}s");

    let prefix = new_asset_prefix(&state.config.buckets.media_root);
    let mut written = Vec::new();

    written.push(preserve_original(state, &asset, &classification, &prefix).await?);

    let target = match crate::ladder::nearest_lower_tier(dimension.height) {
        TierSearch::Found(index) => {
            tracing::debug!("Selected {} rendition", index.tier().name);
            crate::ladder::dimension_for_tier(index)
        }
        TierSearch::Exhausted => {
            tracing::info!("No tier below {dimension}, skipping rendition");
            None
        }
        TierSearch::Invalid(e) => {
            tracing::warn!("{e}, skipping rendition");
            None
        }
    };

    if let Some(target) = target {
        let spec = ArtifactSpec::rendition(target);
        let suffix = rendition_suffix(target.height);

        written.push(write_artifact(state, &source, &spec, &prefix, &suffix).await?);
    }

    for thumbnail in &state.config.media.video.thumbnails {
        let spec = ArtifactSpec::video_thumbnail(
            thumbnail.dimension(),
            thumbnail.format,
            thumbnail.seek_seconds(duration),
        );

        let key = write_artifact(state, &source, &spec, &prefix, &thumbnail.suffix()).await?;
        written.push(key);
    }

    asset.spooled.file.cleanup().await?;

    tracing::info!("Processed media into {prefix}");
    metrics::counter!("vod.pipeline.artifacts", "kind" => "media").increment(written.len() as u64);

    Ok(Outcome { prefix, written })
}

/// Store the original image and a single fixed thumbnail
#[tracing::instrument(skip_all, fields(size = asset.spooled.size))]
pub(crate) async fn process_catalogue<S, T>(
    state: &State<S, T>,
    asset: Asset,
) -> Result<Outcome, Error>
where
    S: Store,
    T: Transcoder,
{
    let classification = asset.classify();

    if !matches!(classification.format, Some(InputFormat::Image(_))) {
        tracing::info!("Rejecting {} as catalogue image", classification.content_type);
        return Err(UploadError::UnrecognizedFormat.into());
    }

    do_process_catalogue(state, asset, classification)
        .with_metrics("vod.pipeline.duration", "catalogue")
        .await
}

async fn do_process_catalogue<S, T>(
    state: &State<S, T>,
    asset: Asset,
    classification: Classification,
) -> Result<Outcome, Error>
where
    S: Store,
    T: Transcoder,
{
    let source = MediaSource::file(&asset.spooled.file);

    let dimension = state.transcoder.probe_dimension(&source).await?;

    tracing::debug!("Probed {dimension}");

    let prefix = new_asset_prefix(&state.config.buckets.catalogue_root);
    let mut written = Vec::new();

    written.push(preserve_original(state, &asset, &classification, &prefix).await?);

    let thumbnail = &state.config.media.catalogue.thumbnail;
    let spec = ArtifactSpec::image_thumbnail(thumbnail.dimension(), thumbnail.format);

    written.push(write_artifact(state, &source, &spec, &prefix, &thumbnail.suffix()).await?);

    asset.spooled.file.cleanup().await?;

    tracing::info!("Processed catalogue image into {prefix}");
    metrics::counter!("vod.pipeline.artifacts", "kind" => "catalogue")
        .increment(written.len() as u64);

    Ok(Outcome { prefix, written })
}

async fn preserve_original<S, T>(
    state: &State<S, T>,
    asset: &Asset,
    classification: &Classification,
    prefix: &AssetPrefix,
) -> Result<String, Error>
where
    S: Store,
{
    let key = artifact_path(prefix, &original_suffix(classification.file_extension()));

    if let Some(Origin { bucket, key: source_key }) = &asset.origin {
        state
            .store
            .copy(bucket, source_key, &key, &classification.content_type)
            .await?;
    } else {
        let bytes = tokio::fs::read(&asset.spooled.file).await?;

        state
            .store
            .upload(&key, Bytes::from(bytes), &classification.content_type)
            .await?;
    }

    Ok(key)
}

async fn write_artifact<S, T>(
    state: &State<S, T>,
    source: &MediaSource<'_>,
    spec: &ArtifactSpec,
    prefix: &AssetPrefix,
    suffix: &str,
) -> Result<String, Error>
where
    S: Store,
    T: Transcoder,
{
    let bytes = state.transcoder.transcode(source, spec).await?;

    let key = artifact_path(prefix, suffix);

    state.store.upload(&key, bytes, &spec.media_type()).await?;

    Ok(key)
}
