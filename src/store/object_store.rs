use std::{path::Path as FsPath, sync::Arc, time::Duration};

use ::object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, path::Path, Attribute, AttributeValue,
    Attributes, ClientOptions, ObjectStore as _, PutOptions, PutPayload,
};
use actix_web::web::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::{
    config::ObjectStorage,
    store::{Store, StoreError},
};

type DynObjectStore = Arc<dyn ::object_store::ObjectStore>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ObjectError {
    #[error("Failed to build object store client")]
    Build(#[source] ::object_store::Error),

    #[error("Invalid object key")]
    Path(#[from] ::object_store::path::Error),

    #[error("Error in object storage request")]
    Request(#[from] ::object_store::Error),

    #[error("Bucket {0} is not configured")]
    UnknownBucket(String),

    #[error("Failed to prepare storage directory")]
    Io(#[from] std::io::Error),
}

impl ObjectError {
    pub(super) const fn is_not_found(&self) -> bool {
        matches!(self, Self::Request(::object_store::Error::NotFound { .. }))
    }
}

/// Input and output buckets behind one handle
///
/// Writes to the output bucket go through their own client so request-wide headers like the
/// public-read ACL are only sent with puts and copies.
#[derive(Clone)]
pub(crate) struct ObjectStore {
    input_bucket: Arc<str>,
    input: DynObjectStore,
    output_bucket: Arc<str>,
    output: DynObjectStore,
    output_writer: DynObjectStore,
    content_types: bool,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("input_bucket", &self.input_bucket)
            .field("output_bucket", &self.output_bucket)
            .finish()
    }
}

impl ObjectStore {
    pub(crate) fn from_parts(
        input_bucket: &str,
        input: DynObjectStore,
        output_bucket: &str,
        output: DynObjectStore,
        content_types: bool,
    ) -> Self {
        ObjectStore {
            input_bucket: Arc::from(input_bucket),
            input,
            output_bucket: Arc::from(output_bucket),
            output_writer: output.clone(),
            output,
            content_types,
        }
    }

    fn with_output_writer(mut self, output_writer: DynObjectStore) -> Self {
        self.output_writer = output_writer;
        self
    }

    /// Each bucket becomes a directory below `path`
    #[tracing::instrument]
    pub(crate) async fn filesystem(
        path: &FsPath,
        input_bucket: &str,
        output_bucket: &str,
    ) -> Result<Self, ObjectError> {
        let input_path = path.join(input_bucket);
        let output_path = path.join(output_bucket);

        tokio::fs::create_dir_all(&input_path).await?;
        tokio::fs::create_dir_all(&output_path).await?;

        let input = LocalFileSystem::new_with_prefix(input_path).map_err(ObjectError::Build)?;
        let output = LocalFileSystem::new_with_prefix(output_path).map_err(ObjectError::Build)?;

        // the local backend can't store attributes
        Ok(Self::from_parts(
            input_bucket,
            Arc::new(input),
            output_bucket,
            Arc::new(output),
            false,
        ))
    }

    #[tracing::instrument(skip(config))]
    pub(crate) fn object_storage(
        config: &ObjectStorage,
        input_bucket: &str,
        output_bucket: &str,
    ) -> Result<Self, ObjectError> {
        let input = s3_bucket(config, input_bucket, false)?;
        let output = s3_bucket(config, output_bucket, false)?;

        let store = Self::from_parts(
            input_bucket,
            Arc::new(input),
            output_bucket,
            Arc::new(output),
            true,
        );

        if config.public_read {
            let writer = s3_bucket(config, output_bucket, true)?;
            return Ok(store.with_output_writer(Arc::new(writer)));
        }

        Ok(store)
    }

    fn bucket(&self, bucket: &str) -> Result<&DynObjectStore, ObjectError> {
        if bucket == &*self.output_bucket {
            Ok(&self.output)
        } else if bucket == &*self.input_bucket {
            Ok(&self.input)
        } else {
            Err(ObjectError::UnknownBucket(bucket.to_string()))
        }
    }

    fn put_options(&self, content_type: &mime::Mime) -> PutOptions {
        let mut options = PutOptions::default();

        if self.content_types {
            let mut attributes = Attributes::new();
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_string()),
            );
            options.attributes = attributes;
        }

        options
    }
}

fn s3_bucket(
    config: &ObjectStorage,
    bucket: &str,
    public_read: bool,
) -> Result<::object_store::aws::AmazonS3, ObjectError> {
    let mut client_options =
        ClientOptions::new().with_timeout(Duration::from_secs(config.client_timeout));

    if public_read {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-amz-acl"),
            HeaderValue::from_static("public-read"),
        );
        client_options = client_options.with_default_headers(headers);
    }

    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(bucket)
        .with_region(&config.region)
        .with_virtual_hosted_style_request(!config.use_path_style)
        .with_client_options(client_options);

    if let Some(endpoint) = &config.endpoint {
        builder = builder
            .with_endpoint(endpoint.as_str().trim_end_matches('/'))
            .with_allow_http(endpoint.scheme() == "http");
    }

    if let Some(access_key) = &config.access_key {
        builder = builder.with_access_key_id(access_key);
    }

    if let Some(secret_key) = &config.secret_key {
        builder = builder.with_secret_access_key(secret_key);
    }

    if let Some(session_token) = &config.session_token {
        builder = builder.with_token(session_token);
    }

    builder.build().map_err(ObjectError::Build)
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.output
            .list_with_delimiter(None)
            .await
            .map_err(ObjectError::from)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, StoreError> {
        let store = self.bucket(bucket)?;
        let path = Path::parse(key).map_err(ObjectError::from)?;

        let bytes = store
            .get(&path)
            .await
            .map_err(ObjectError::from)?
            .bytes()
            .await
            .map_err(ObjectError::from)?;

        Ok(bytes)
    }

    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError> {
        let path = Path::parse(key).map_err(ObjectError::from)?;

        self.output_writer
            .put_opts(&path, PutPayload::from(bytes), self.put_options(content_type))
            .await
            .map_err(ObjectError::from)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn copy(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_key: &str,
        content_type: &mime::Mime,
    ) -> Result<(), StoreError> {
        if source_bucket == &*self.output_bucket {
            let from = Path::parse(source_key).map_err(ObjectError::from)?;
            let to = Path::parse(dest_key).map_err(ObjectError::from)?;

            self.output_writer
                .copy(&from, &to)
                .await
                .map_err(ObjectError::from)?;

            return Ok(());
        }

        let bytes = self.download(source_bucket, source_key).await?;

        self.upload(dest_key, bytes, content_type).await
    }
}
