use crate::{
    config::Buckets,
    error::{Error, UploadError},
    ffmpeg::Transcoder,
    ingest::spool_bytes,
    pipeline::{process_catalogue, process_media, Asset, Outcome},
    state::State,
    store::Store,
};

/// Bucket notification as sent by S3 and MinIO
#[derive(Debug, serde::Deserialize)]
pub(crate) struct Notification {
    #[serde(rename = "Records", default)]
    records: Vec<Record>,
}

#[derive(Debug, serde::Deserialize)]
struct Record {
    s3: S3Entity,
}

#[derive(Debug, serde::Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, serde::Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, serde::Deserialize)]
struct S3Object {
    key: String,
}

/// The pipeline an object key is routed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    Catalogue,
    Media,
}

impl Notification {
    pub(crate) fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Object keys arrive form-encoded
pub(crate) fn decode_key(key: &str) -> String {
    // keep literal separators inside the single "name"
    let escaped = key.replace('&', "%26").replace('=', "%3D");

    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default()
}

pub(crate) fn route(buckets: &Buckets, key: &str) -> Option<Route> {
    if key.starts_with(&buckets.catalogue_prefix) {
        Some(Route::Catalogue)
    } else if key.starts_with(&buckets.media_prefix) {
        Some(Route::Media)
    } else {
        None
    }
}

/// Process every record of a notification in order, stopping at the first failure
///
/// Objects that are empty or not in a format their pipeline accepts are skipped, so a
/// notification for them is not redelivered forever.
#[tracing::instrument(skip_all, fields(records = notification.records.len()))]
pub(crate) async fn handle<S, T>(
    state: &State<S, T>,
    notification: Notification,
) -> Result<Vec<Outcome>, Error>
where
    S: Store,
    T: Transcoder,
{
    let mut outcomes = Vec::new();

    for Record { s3 } in notification.records {
        let S3Entity { bucket, object } = s3;

        if bucket.name != state.config.buckets.input {
            return Err(UploadError::WrongBucket(bucket.name).into());
        }

        let key = decode_key(&object.key);
        let Some(route) = route(&state.config.buckets, &key) else {
            tracing::info!("Ignoring {key}, no pipeline for its prefix");
            continue;
        };

        match handle_record(state, &bucket.name, &key, route).await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if e.is_unprocessable_input() => {
                tracing::info!("Skipping {key}, not a supported format");
                metrics::counter!("vod.events.skipped").increment(1);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(outcomes)
}

#[tracing::instrument(skip(state))]
async fn handle_record<S, T>(
    state: &State<S, T>,
    bucket: &str,
    key: &str,
    route: Route,
) -> Result<Outcome, Error>
where
    S: Store,
    T: Transcoder,
{
    let bytes = state.store.download(bucket, key).await?;

    let spooled = spool_bytes(&state.tmp_dir, bytes, crate::max_bytes(&state.config)).await?;

    let asset = Asset::stored(spooled, bucket, key);

    match route {
        Route::Catalogue => process_catalogue(state, asset).await,
        Route::Media => process_media(state, asset).await,
    }
}

#[cfg(test)]
mod tests {
    use actix_web::web::Bytes;
    use object_store::{path::Path, ObjectStore as _};

    use super::{decode_key, handle, route, Notification, Route};
    use crate::{
        error::{Error, UploadError},
        pipeline::tests::{test_state, written_keys, FakeTranscoder, TestState, MP4, PNG},
    };

    fn notification(bucket: &str, key: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "Records": [{
                "eventName": "s3:ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": bucket, "arn": "arn:aws:s3:::vod-uploads" },
                    "object": { "key": key, "size": 12 }
                }
            }]
        }))
        .unwrap()
    }

    #[test]
    fn keys_are_decoded() {
        assert_eq!(decode_key("media/my+clip%282%29.mp4"), "media/my clip(2).mp4");
        assert_eq!(decode_key("media/a%26b%3Dc.mp4"), "media/a&b=c.mp4");
        assert_eq!(decode_key("media/a&b=c.mp4"), "media/a&b=c.mp4");
        assert_eq!(decode_key(""), "");
    }

    #[test]
    fn routes_by_prefix() {
        let buckets = crate::config::Buckets {
            input: String::from("in"),
            output: String::from("out"),
            media_prefix: String::from("media/"),
            catalogue_prefix: String::from("catalogue/"),
            media_root: String::from("m"),
            catalogue_root: String::from("c"),
        };

        assert_eq!(route(&buckets, "media/clip.mp4"), Some(Route::Media));
        assert_eq!(route(&buckets, "catalogue/shoe.png"), Some(Route::Catalogue));
        assert_eq!(route(&buckets, "other/clip.mp4"), None);
        assert_eq!(route(&buckets, "mediafile.mp4"), None);
    }

    #[test]
    fn missing_records_is_empty() {
        let notification = Notification::from_slice(b"{}").unwrap();
        assert!(notification.records.is_empty());

        let err = Notification::from_slice(b"not json").unwrap_err();
        assert!(matches!(err.kind(), Some(UploadError::Event(_))), "{err:?}");
        assert!(err.is_client_error());
    }

    async fn put_input(input: &object_store::memory::InMemory, key: &str, bytes: &'static [u8]) {
        input
            .put(&Path::from(key), Bytes::from_static(bytes).into())
            .await
            .unwrap();
    }

    #[test]
    fn unsupported_objects_are_skipped() {
        let (count, keys) = test_async!(async move {
            let TestState {
                state,
                input,
                output,
            } = test_state(FakeTranscoder::new(1920, 1080, 31.0)).await?;

            put_input(&input, "media/notes.txt", b"plain text, not a video").await;

            let notification =
                Notification::from_slice(&notification("vod-uploads", "media/notes.txt"))?;
            let outcomes = handle(&state, notification).await?;

            Ok::<_, Error>((outcomes.len(), written_keys(&output).await))
        })
        .unwrap();

        assert_eq!(count, 0);
        assert!(keys.is_empty(), "{keys:?}");
    }

    #[test]
    fn empty_objects_are_skipped() {
        let (count, keys) = test_async!(async move {
            let TestState {
                state,
                input,
                output,
            } = test_state(FakeTranscoder::new(1920, 1080, 31.0)).await?;

            put_input(&input, "media/empty.bin", b"").await;
            put_input(&input, "catalogue/empty.png", b"").await;

            let mut count = 0;

            for key in ["media/empty.bin", "catalogue/empty.png"] {
                let notification = Notification::from_slice(&notification("vod-uploads", key))?;
                count += handle(&state, notification).await?.len();
            }

            Ok::<_, Error>((count, written_keys(&output).await))
        })
        .unwrap();

        assert_eq!(count, 0);
        assert!(keys.is_empty(), "{keys:?}");
    }

    #[test]
    fn media_and_catalogue_are_dispatched() {
        let transcoder = FakeTranscoder::new(1920, 1080, 31.0);

        let outcomes = test_async!(async move {
            let TestState { state, input, .. } = test_state(transcoder).await?;

            put_input(&input, "media/my clip.mp4", MP4).await;
            put_input(&input, "catalogue/shoe.png", PNG).await;

            let media = handle(
                &state,
                Notification::from_slice(&notification("vod-uploads", "media/my+clip.mp4"))?,
            )
            .await?;
            let catalogue = handle(
                &state,
                Notification::from_slice(&notification("vod-uploads", "catalogue/shoe.png"))?,
            )
            .await?;

            Ok::<_, Error>((media, catalogue))
        })
        .unwrap();

        let (media, catalogue) = outcomes;

        assert_eq!(media.len(), 1);
        assert!(media[0].prefix.as_str().starts_with("findappmedia/"));
        assert_eq!(media[0].written.len(), 3);

        assert_eq!(catalogue.len(), 1);
        assert!(catalogue[0].prefix.as_str().starts_with("findappcatalogue/"));
        assert!(catalogue[0].written[1].ends_with("/600.png"));
    }

    #[test]
    fn other_buckets_are_rejected() {
        let res = test_async!(async move {
            let TestState { state, .. } = test_state(FakeTranscoder::new(1920, 1080, 31.0)).await?;

            let notification =
                Notification::from_slice(&notification("someone-elses", "media/clip.mp4"))?;

            handle(&state, notification).await.map(|_| ())
        });

        let err = res.unwrap_err();
        assert!(matches!(err.kind(), Some(UploadError::WrongBucket(_))), "{err:?}");
        assert!(err.is_client_error());
    }

    #[test]
    fn unknown_prefixes_are_ignored() {
        let (count, keys) = test_async!(async move {
            let TestState { state, output, .. } =
                test_state(FakeTranscoder::new(1920, 1080, 31.0)).await?;

            // never downloaded, so it doesn't need to exist
            let notification =
                Notification::from_slice(&notification("vod-uploads", "elsewhere/clip.mp4"))?;
            let outcomes = handle(&state, notification).await?;

            Ok::<_, Error>((outcomes.len(), written_keys(&output).await))
        })
        .unwrap();

        assert_eq!(count, 0);
        assert!(keys.is_empty(), "{keys:?}");
    }

    #[test]
    fn missing_objects_fail() {
        let res = test_async!(async move {
            let TestState { state, .. } = test_state(FakeTranscoder::new(1920, 1080, 31.0)).await?;

            let notification =
                Notification::from_slice(&notification("vod-uploads", "media/gone.mp4"))?;

            handle(&state, notification).await.map(|_| ())
        });

        let err = res.unwrap_err();
        assert!(matches!(err.kind(), Some(UploadError::Store(e)) if e.is_not_found()), "{err:?}");
        assert!(err.is_client_error());
    }
}
