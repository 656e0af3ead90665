use crate::config::S3Config;
use anyhow::Result;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors raised by the object storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to upload object {key}: {message}")]
    Upload { key: String, message: String },

    #[error("failed to resolve URL for {key}: {message}")]
    Url { key: String, message: String },

    #[error("failed to delete object {key}: {message}")]
    Delete { key: String, message: String },
}

/// Binary storage for photo content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str)
        -> Result<(), StorageError>;

    /// Resolve a URL a browser can load the object from
    async fn public_url(&self, key: &str) -> Result<String, StorageError>;

    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}

/// S3 (or S3-compatible) photo storage
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    config: S3Config,
    presigned_url_expiry: Duration,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    pub async fn new(config: &S3Config) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            public_base_url = ?config.public_base_url,
            "S3 object store initialized"
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            config: config.clone(),
            presigned_url_expiry: config.presigned_url_expiry(),
        })
    }

    /// Simple single-part upload for small files
    async fn simple_upload(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;

        Ok(())
    }

    /// Multipart upload for large files
    async fn multipart_upload(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), String> {
        let create_response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;

        let upload_id = create_response
            .upload_id()
            .ok_or_else(|| "no upload ID in response".to_string())?
            .to_string();

        match self.upload_parts(key, &upload_id, body).await {
            Ok(completed_parts) => {
                let completed_upload = CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build();

                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed_upload)
                    .send()
                    .await
                    .map_err(|e| DisplayErrorContext(e).to_string())?;

                Ok(())
            }
            Err(message) => {
                // Leave no dangling parts behind
                if let Err(e) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(key = %key, error = %DisplayErrorContext(e), "Failed to abort multipart upload");
                }
                Err(message)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        body: Bytes,
    ) -> Result<Vec<CompletedPart>, String> {
        let part_size = self.config.part_size_bytes.max(1);
        let mut completed_parts = Vec::new();
        let mut part_number = 1;
        let mut offset = 0;

        while offset < body.len() {
            let end = (offset + part_size).min(body.len());
            let chunk = body.slice(offset..end);

            let upload_part_response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| DisplayErrorContext(e).to_string())?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(upload_part_response.e_tag().unwrap_or_default())
                    .build(),
            );

            part_number += 1;
            offset = end;
        }

        Ok(completed_parts)
    }

    async fn presigned_url(&self, key: &str) -> Result<String, String> {
        let presigning_config =
            PresigningConfig::expires_in(self.presigned_url_expiry).map_err(|e| e.to_string())?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| DisplayErrorContext(e).to_string())?;

        Ok(presigned.uri().to_string())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, body), fields(size_bytes = body.len()))]
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = body.len();

        // Check if we should use multipart upload
        let result = if size > self.config.multipart_threshold_bytes {
            self.multipart_upload(key, body, content_type).await
        } else {
            self.simple_upload(key, body, content_type).await
        };

        result.map_err(|message| StorageError::Upload {
            key: key.to_string(),
            message,
        })?;

        debug!(key = %key, size_bytes = size, "Object stored");
        Ok(())
    }

    async fn public_url(&self, key: &str) -> Result<String, StorageError> {
        if let Some(ref base) = self.config.public_base_url {
            return Ok(join_public_url(base, key));
        }

        self.presigned_url(key)
            .await
            .map_err(|message| StorageError::Url {
                key: key.to_string(),
                message,
            })
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        debug!(key = %key, "Object deleted");
        Ok(())
    }
}

/// Join a public base URL and an object key with exactly one slash
fn join_public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
