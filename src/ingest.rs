use actix_web::web::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::{
    error::{Error, UploadError},
    formats::SNIFF_LEN,
    tmp_file::{TmpDir, TmpFile},
};

/// An inbound upload written to scratch space
#[derive(Debug)]
pub(crate) struct Spooled {
    pub(crate) file: TmpFile,
    pub(crate) head: Vec<u8>,
    pub(crate) size: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("Upload exceeded {limit} bytes")]
pub(crate) struct LimitError {
    limit: u64,
}

/// Write `stream` to a fresh temp file, keeping the leading bytes for sniffing
///
/// Fails once more than `max_bytes` have been seen. The temp file is removed on every error
/// path since it is dropped with the partial result.
#[tracing::instrument(skip(tmp_dir, stream))]
pub(crate) async fn spool<S>(tmp_dir: &TmpDir, stream: S, max_bytes: u64) -> Result<Spooled, Error>
where
    S: Stream<Item = Result<Bytes, Error>>,
{
    let file = tmp_dir.tmp_file(None);
    let mut writer = tokio::fs::File::create(&file).await?;

    let mut head = Vec::with_capacity(SNIFF_LEN);
    let mut size = 0u64;

    let mut stream = std::pin::pin!(stream);

    while let Some(res) = stream.next().await {
        let bytes = res?;

        size += bytes.len() as u64;

        if size > max_bytes {
            return Err(UploadError::Limit(LimitError { limit: max_bytes }).into());
        }

        if head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - head.len()).min(bytes.len());
            head.extend_from_slice(&bytes[..take]);
        }

        writer.write_all(&bytes).await?;
    }

    writer.flush().await?;
    drop(writer);

    if size == 0 {
        return Err(UploadError::EmptyUpload.into());
    }

    tracing::debug!("Spooled {size} bytes");

    Ok(Spooled { file, head, size })
}

/// Write already-buffered bytes to a fresh temp file
pub(crate) async fn spool_bytes(
    tmp_dir: &TmpDir,
    bytes: Bytes,
    max_bytes: u64,
) -> Result<Spooled, Error> {
    spool(
        tmp_dir,
        futures_util::stream::once(async move { Ok(bytes) }),
        max_bytes,
    )
    .await
}

#[cfg(test)]
mod tests {
    use actix_web::web::Bytes;

    use super::{spool, spool_bytes};
    use crate::{
        error::{Error, UploadError},
        tmp_file::TmpDir,
    };

    fn chunks(count: usize, size: usize) -> impl futures_core::Stream<Item = Result<Bytes, Error>> {
        futures_util::stream::iter((0..count).map(move |i| Ok(Bytes::from(vec![i as u8; size]))))
    }

    #[test]
    fn keeps_head_and_writes_everything() {
        let (head, size, contents) = test_async!(async move {
            let tmp_dir = TmpDir::init(std::env::temp_dir()).await?;

            let spooled = spool(&tmp_dir, chunks(4, 300), 10_000).await?;
            let contents = tokio::fs::read(&spooled.file).await?;

            Ok::<_, Error>((spooled.head, spooled.size, contents))
        })
        .unwrap();

        assert_eq!(head.len(), 512);
        assert_eq!(&head[..300], &[0u8; 300][..]);
        assert_eq!(&head[300..], &[1u8; 212][..]);
        assert_eq!(size, 1200);
        assert_eq!(contents.len(), 1200);
    }

    #[test]
    fn enforces_limit() {
        let res = test_async!(async move {
            let tmp_dir = TmpDir::init(std::env::temp_dir()).await?;

            spool(&tmp_dir, chunks(4, 300), 1000).await.map(|_| ())
        });

        let err = res.unwrap_err();
        assert!(matches!(err.kind(), Some(UploadError::Limit(_))), "{err:?}");
    }

    #[test]
    fn rejects_empty_uploads() {
        let res = test_async!(async move {
            let tmp_dir = TmpDir::init(std::env::temp_dir()).await?;

            spool_bytes(&tmp_dir, Bytes::new(), 1000).await.map(|_| ())
        });

        let err = res.unwrap_err();
        assert!(matches!(err.kind(), Some(UploadError::EmptyUpload)), "{err:?}");
    }

    #[test]
    fn short_uploads_keep_everything() {
        let head = test_async!(async move {
            let tmp_dir = TmpDir::init(std::env::temp_dir()).await?;

            let spooled = spool_bytes(&tmp_dir, Bytes::from_static(b"hello"), 1000).await?;

            Ok::<_, Error>(spooled.head)
        })
        .unwrap();

        assert_eq!(head, b"hello");
    }
}
