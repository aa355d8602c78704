use actix_web::web::Bytes;
use std::fmt::Debug;

use crate::error_code::ErrorCode;

pub(crate) mod object_store;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in object store")]
    ObjectStore(#[source] crate::store::object_store::ObjectError),

    #[error("Requested object is not found")]
    ObjectNotFound(#[source] crate::store::object_store::ObjectError),
}

impl StoreError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ObjectStore(_) => ErrorCode::OBJECT_REQUEST_ERROR,
            Self::ObjectNotFound(_) => ErrorCode::OBJECT_NOT_FOUND,
        }
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_))
    }
}

impl From<crate::store::object_store::ObjectError> for StoreError {
    fn from(value: crate::store::object_store::ObjectError) -> Self {
        if value.is_not_found() {
            Self::ObjectNotFound(value)
        } else {
            Self::ObjectStore(value)
        }
    }
}

/// Blob storage keyed by bucket and object key
///
/// Writes always land in the output bucket.
#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug {
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError>;

    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError>;

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_key: &str,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError>;
}

#[async_trait::async_trait(?Send)]
impl<T> Store for actix_web::web::Data<T>
where
    T: Store,
{
    async fn health_check(&self) -> Result<(), StoreError> {
        T::health_check(self).await
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        T::download(self, bucket, key).await
    }

    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError> {
        T::upload(self, key, bytes, content_type).await
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_key: &str,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError> {
        T::copy(self, source_bucket, source_key, dest_key, content_type).await
    }
}

#[async_trait::async_trait(?Send)]
impl<'a, T> Store for &'a T
where
    T: Store,
{
    async fn health_check(&self) -> Result<(), StoreError> {
        T::health_check(self).await
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        T::download(self, bucket, key).await
    }

    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError> {
        T::upload(self, key, bytes, content_type).await
    }

    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_key: &str,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError> {
        T::copy(self, source_bucket, source_key, dest_key, content_type).await
    }
}
