//! Object storage collaborator
//!
//! Thin wrapper over S3: one object down to a local path, one local path
//! up to an object. The trait seam lets the pipeline run against stub
//! stores in tests.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use sos_common::{Result, SosError};
use std::path::Path;
use tracing::{debug, info};

/// Blob-storage boundary used by the orchestrator
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object into a local file
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<()>;

    /// Upload one local file as an object
    async fn upload(&self, bucket: &str, key: &str, src: &Path) -> Result<()>;
}

/// S3-backed object store
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Client using the ambient credential chain (source bucket access)
    pub async fn from_environment(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: Client::new(&config),
        }
    }

    /// Client using explicit credentials (archive bucket access)
    pub fn with_credentials(region: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "sos-archive");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.to_string()))
            .build();

        Self {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        debug!("Downloading s3://{}/{} to {}", bucket, key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| SosError::transfer(bucket, key, e.to_string()))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| SosError::transfer(bucket, key, e.to_string()))?
            .into_bytes();

        tokio::fs::write(dest, &data).await?;

        info!(
            "Downloaded {} bytes from s3://{}/{}",
            data.len(),
            bucket,
            key
        );

        Ok(())
    }

    async fn upload(&self, bucket: &str, key: &str, src: &Path) -> Result<()> {
        debug!("Uploading {} to s3://{}/{}", src.display(), bucket, key);

        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| SosError::transfer(bucket, key, e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| SosError::transfer(bucket, key, e.to_string()))?;

        info!("Uploaded s3://{}/{}", bucket, key);

        Ok(())
    }
}
