use std::{cell::RefCell, rc::Rc, sync::Arc};

use actix_web::web::Bytes;
use futures_util::TryStreamExt;
use object_store::{memory::InMemory, path::Path, ObjectStore as _};

use super::{process_catalogue, process_media, Asset};
use crate::{
    config::ConfigSource,
    error::{Error, UploadError},
    ffmpeg::{ArtifactKind, ArtifactSpec, FfMpegError, MediaSource, Transcoder},
    formats::ThumbnailFormat,
    ingest::spool_bytes,
    ladder::Dimension,
    probe::ProbeError,
    process::ProcessError,
    state::State,
    store::{object_store::ObjectStore, Store},
    tmp_file::TmpDir,
};

pub(crate) const MP4: &[u8] = b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00isomiso2\x00\x00\x00\x08free";
pub(crate) const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x02\x58\x00\x00\x01\x90";

/// Records every artifact it is asked for and returns a description of it as the bytes
#[derive(Clone)]
pub(crate) struct FakeTranscoder {
    pub(crate) dimension: Dimension,
    pub(crate) duration: f64,
    pub(crate) fail_transcode_at: Option<usize>,
    pub(crate) calls: Rc<RefCell<Vec<ArtifactSpec>>>,
}

impl FakeTranscoder {
    pub(crate) fn new(width: u32, height: u32, duration: f64) -> Self {
        FakeTranscoder {
            dimension: Dimension::new(width, height),
            duration,
            fail_transcode_at: None,
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub(crate) fn calls(&self) -> Vec<ArtifactSpec> {
        self.calls.borrow().clone()
    }
}

#[async_trait::async_trait(?Send)]
impl Transcoder for FakeTranscoder {
    async fn probe_dimension(&self, _: &MediaSource<'_>) -> Result<Dimension, ProbeError> {
        if self.dimension.is_degenerate() {
            return Err(ProbeError::InvalidResolution(self.dimension));
        }

        Ok(self.dimension)
    }

    async fn probe_duration(&self, _: &MediaSource<'_>) -> Result<f64, ProbeError> {
        Ok(self.duration)
    }

    async fn transcode(
        &self,
        _: &MediaSource<'_>,
        spec: &ArtifactSpec,
    ) -> Result<Bytes, FfMpegError> {
        let mut calls = self.calls.borrow_mut();

        if self.fail_transcode_at == Some(calls.len()) {
            return Err(ProcessError::Timeout(String::from("ffmpeg")).into());
        }

        calls.push(*spec);

        Ok(Bytes::from(format!("{:?} {}", spec.kind, spec.target)))
    }
}

pub(crate) struct TestState {
    pub(crate) state: State<ObjectStore, FakeTranscoder>,
    pub(crate) input: Arc<InMemory>,
    pub(crate) output: Arc<InMemory>,
}

pub(crate) async fn test_state(transcoder: FakeTranscoder) -> Result<TestState, Error> {
    let config = crate::config::configure_without_clap(ConfigSource::empty(), None::<&str>)
        .map_err(|e| std::io::Error::other(e.to_string()))?
        .config;

    let input = Arc::new(InMemory::new());
    let output = Arc::new(InMemory::new());

    let store = ObjectStore::from_parts(
        &config.buckets.input,
        input.clone(),
        &config.buckets.output,
        output.clone(),
        true,
    );

    let client = crate::build_client(&config)?;

    let state = State {
        tmp_dir: TmpDir::init(std::env::temp_dir()).await?,
        config,
        store,
        transcoder,
        client,
    };

    Ok(TestState {
        state,
        input,
        output,
    })
}

pub(crate) async fn written_keys(output: &InMemory) -> Vec<String> {
    let mut keys = output
        .list(None)
        .map_ok(|meta| meta.location.to_string())
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    keys.sort();
    keys
}

async fn upload(state: &State<ObjectStore, FakeTranscoder>, bytes: &'static [u8]) -> Result<Asset, Error> {
    let spooled = spool_bytes(&state.tmp_dir, Bytes::from_static(bytes), 1024 * 1024).await?;

    Ok(Asset::uploaded(spooled))
}

#[test]
fn video_gets_original_rendition_and_thumbnail() {
    let transcoder = FakeTranscoder::new(1920, 1080, 31.0);
    let recorder = transcoder.clone();

    let (outcome, original, spool_path) = test_async!(async move {
        let TestState { state, .. } = test_state(transcoder).await?;

        let asset = upload(&state, MP4).await?;
        let spool_path = asset.spooled.file.to_path_buf();

        let outcome = process_media(&state, asset).await?;
        let original = state.store.download("vod-file-storage", &outcome.written[0]).await?;

        Ok::<_, Error>((outcome, original, spool_path))
    })
    .unwrap();

    let prefix = outcome.prefix.as_str().to_string();
    assert!(prefix.starts_with("findappmedia/"), "{prefix}");

    assert_eq!(
        outcome.written,
        vec![
            format!("{prefix}/original.mp4"),
            format!("{prefix}/720.mp4"),
            format!("{prefix}/thumb.png"),
        ]
    );

    assert_eq!(original, Bytes::from_static(MP4));
    assert!(!spool_path.exists());

    assert_eq!(
        recorder.calls(),
        vec![
            ArtifactSpec::rendition(Dimension::new(1280, 720)),
            ArtifactSpec::video_thumbnail(Dimension::new(600, 600), ThumbnailFormat::Png, 15.5),
        ]
    );
}

#[test]
fn catalogue_image_gets_original_and_square_thumbnail() {
    let transcoder = FakeTranscoder::new(600, 400, 0.0);
    let recorder = transcoder.clone();

    let (outcome, thumbnail) = test_async!(async move {
        let TestState { state, .. } = test_state(transcoder).await?;

        let asset = upload(&state, PNG).await?;
        let outcome = process_catalogue(&state, asset).await?;
        let thumbnail = state.store.download("vod-file-storage", &outcome.written[1]).await?;

        Ok::<_, Error>((outcome, thumbnail))
    })
    .unwrap();

    let prefix = outcome.prefix.as_str().to_string();
    assert!(prefix.starts_with("findappcatalogue/"), "{prefix}");

    assert_eq!(
        outcome.written,
        vec![format!("{prefix}/original.png"), format!("{prefix}/600.png")]
    );
    assert_eq!(
        thumbnail,
        Bytes::from(format!("{:?} 600x600", ArtifactKind::ImageThumbnail { format: ThumbnailFormat::Png }))
    );
    assert_eq!(
        recorder.calls(),
        vec![ArtifactSpec::image_thumbnail(
            Dimension::new(600, 600),
            ThumbnailFormat::Png
        )]
    );
}

#[test]
fn wrong_category_is_unrecognized() {
    let transcoder = FakeTranscoder::new(1920, 1080, 31.0);
    let recorder = transcoder.clone();

    let (media, catalogue, text, keys) = test_async!(async move {
        let TestState { state, output, .. } = test_state(transcoder).await?;

        let media = process_media(&state, upload(&state, PNG).await?).await.map(|_| ());
        let catalogue = process_catalogue(&state, upload(&state, MP4).await?).await.map(|_| ());
        let text = process_media(&state, upload(&state, b"just some text").await?)
            .await
            .map(|_| ());

        Ok::<_, Error>((media, catalogue, text, written_keys(&output).await))
    })
    .unwrap();

    for res in [media, catalogue, text] {
        let err = res.unwrap_err();
        assert!(err.is_unrecognized_format(), "{err:?}");
    }

    assert!(keys.is_empty(), "{keys:?}");
    assert!(recorder.calls().is_empty());
}

#[test]
fn same_bytes_twice_get_distinct_prefixes() {
    let (first, second) = test_async!(async move {
        let TestState { state, .. } = test_state(FakeTranscoder::new(1920, 1080, 10.0)).await?;

        let first = process_media(&state, upload(&state, MP4).await?).await?;
        let second = process_media(&state, upload(&state, MP4).await?).await?;

        Ok::<_, Error>((first, second))
    })
    .unwrap();

    assert_ne!(first.prefix, second.prefix);
    assert_eq!(first.written.len(), second.written.len());
}

#[test]
fn first_failure_stops_the_run() {
    let mut transcoder = FakeTranscoder::new(1920, 1080, 31.0);
    transcoder.fail_transcode_at = Some(0);

    let (res, keys, spool_path) = test_async!(async move {
        let TestState { state, output, .. } = test_state(transcoder).await?;

        let asset = upload(&state, MP4).await?;
        let spool_path = asset.spooled.file.to_path_buf();

        let res = process_media(&state, asset).await.map(|_| ());

        Ok::<_, Error>((res, written_keys(&output).await, spool_path))
    })
    .unwrap();

    assert!(!spool_path.exists(), "{} was left behind", spool_path.display());

    let err = res.unwrap_err();
    assert!(matches!(err.kind(), Some(UploadError::Ffmpeg(_))), "{err:?}");
    assert!(!err.is_client_error());

    // the original was already written and stays
    assert_eq!(keys.len(), 1, "{keys:?}");
    assert!(keys[0].ends_with("/original.mp4"), "{keys:?}");
}

#[test]
fn degenerate_media_is_rejected_before_writing() {
    let (res, keys, spool_path) = test_async!(async move {
        let TestState { state, output, .. } = test_state(FakeTranscoder::new(5, 5, 1.0)).await?;

        let asset = upload(&state, MP4).await?;
        let spool_path = asset.spooled.file.to_path_buf();

        let res = process_media(&state, asset).await.map(|_| ());

        Ok::<_, Error>((res, written_keys(&output).await, spool_path))
    })
    .unwrap();

    assert!(!spool_path.exists(), "{} was left behind", spool_path.display());

    let err = res.unwrap_err();
    assert!(
        matches!(err.kind(), Some(UploadError::Probe(ProbeError::InvalidResolution(_)))),
        "{err:?}"
    );
    assert!(err.is_client_error());
    assert!(keys.is_empty(), "{keys:?}");
}

#[test]
fn small_sources_use_lowest_tier() {
    let transcoder = FakeTranscoder::new(320, 200, 4.0);
    let recorder = transcoder.clone();

    let outcome = test_async!(async move {
        let TestState { state, .. } = test_state(transcoder).await?;

        process_media(&state, upload(&state, MP4).await?).await
    })
    .unwrap();

    assert!(outcome.written[1].ends_with("/240.mp4"), "{:?}", outcome.written);
    assert_eq!(
        recorder.calls()[0],
        ArtifactSpec::rendition(Dimension::new(426, 240))
    );
}

#[test]
fn configured_offset_is_used() {
    let transcoder = FakeTranscoder::new(1280, 720, 30.0);
    let recorder = transcoder.clone();

    test_async!(async move {
        let TestState { mut state, .. } = test_state(transcoder).await?;

        state.config.media.video.thumbnails[0].offset = Some(2.0);
        state.config.media.video.thumbnails.push(crate::config::VideoThumbnail {
            name: String::from("late"),
            width: 320,
            height: 180,
            format: ThumbnailFormat::Jpeg,
            offset: Some(90.0),
        });

        process_media(&state, upload(&state, MP4).await?).await.map(|_| ())
    })
    .unwrap();

    assert_eq!(
        recorder.calls()[1..],
        [
            ArtifactSpec::video_thumbnail(Dimension::new(600, 600), ThumbnailFormat::Png, 2.0),
            ArtifactSpec::video_thumbnail(Dimension::new(320, 180), ThumbnailFormat::Jpeg, 30.0),
        ]
    );
}

#[test]
fn stored_assets_are_copied_from_their_origin() {
    let original = test_async!(async move {
        let TestState { state, input, .. } =
            test_state(FakeTranscoder::new(1920, 1080, 31.0)).await?;

        input
            .put(&Path::from("media/clip.mp4"), Bytes::from_static(MP4).into())
            .await
            .unwrap();

        let bytes = state.store.download("vod-uploads", "media/clip.mp4").await?;
        let spooled = spool_bytes(&state.tmp_dir, bytes, 1024 * 1024).await?;

        let outcome =
            process_media(&state, Asset::stored(spooled, "vod-uploads", "media/clip.mp4")).await?;

        Ok::<_, Error>(
            state
                .store
                .download("vod-file-storage", &outcome.written[0])
                .await?,
        )
    })
    .unwrap();

    assert_eq!(original, Bytes::from_static(MP4));
}
