use crate::config::S3Settings;
use crate::ports::storage::{ObjectStore, ObjectStream, StorageError, Visibility};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use std::path::Path;
use tokio_util::io::ReaderStream;

/// S3Store implements ObjectStore for AWS S3 and S3-compatible providers.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Build a client with explicit credentials, path-style addressing and
    /// connect/operation timeouts.
    pub async fn connect(settings: &S3Settings) -> Self {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(settings.connect_timeout)
            .operation_timeout(settings.operation_timeout)
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .timeout_config(timeouts);

        if let (Some(key_id), Some(secret)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "hlsdrop-env",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(true);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::info!(
            bucket = %settings.bucket,
            endpoint = ?settings.endpoint,
            region = %settings.region,
            "S3 client configured"
        );

        Self::new(Client::from_conf(builder.build()), settings.bucket.clone())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(source).await.map_err(|e| {
            tracing::error!(error = %e, source = %source.display(), "Could not open upload source");
            StorageError::Io(std::io::Error::other(e))
        })?;
        let size = body.size_hint().1.unwrap_or_default();

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type);
        if visibility == Visibility::PublicRead {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request.send().await.map_err(|e| {
            tracing::error!(error = %e, bucket = %self.bucket, key, size, "S3 put failed");
            StorageError::Backend(e.to_string())
        })?;

        tracing::debug!(bucket = %self.bucket, key, size, "S3 put successful");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectStream, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    GetObjectError::NoSuchKey(_) => StorageError::NotFound(key.to_string()),
                    _ => StorageError::Backend(e.to_string()),
                },
                _ => StorageError::Backend(e.to_string()),
            })?;

        Ok(Box::pin(ReaderStream::new(response.body.into_async_read())))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::Backend(e.to_string()))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(String::from)),
            );
        }
        Ok(keys)
    }
}
