//! Cloudflare R2 client (S3 API).

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectStore, StoredObject};

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: required_env("R2_ENDPOINT_URL")?,
            access_key_id: required_env("R2_ACCESS_KEY_ID")?,
            secret_access_key: required_env("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required_env("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

fn required_env(name: &str) -> StorageResult<String> {
    std::env::var(name).map_err(|_| StorageError::config_error(format!("{name} not set")))
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    /// Bucket this client writes to.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a file to R2.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{key}: {e}")))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Download an object with its stored content type.
    pub async fn get_object(&self, key: &str) -> StorageResult<StoredObject> {
        debug!("Downloading {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(format!("{key}: {e}"))
                }
            })?;

        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(format!("{key}: {e}")))?
            .into_bytes()
            .to_vec();

        Ok(StoredObject {
            content_length: bytes.len() as u64,
            bytes,
            content_type,
        })
    }

    /// Check connectivity to R2 by performing a head bucket operation.
    pub async fn head_bucket(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for R2Client {
    async fn upload(&self, local: &Path, key: &str, content_type: &str) -> StorageResult<()> {
        self.upload_file(local, key, content_type).await
    }

    async fn fetch(&self, key: &str) -> StorageResult<StoredObject> {
        self.get_object(key).await
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.head_bucket().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_requires_endpoint() {
        std::env::remove_var("R2_ENDPOINT_URL");
        let err = R2Config::from_env().unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
    }

    #[tokio::test]
    #[ignore = "requires R2 credentials"]
    async fn test_r2_round_trip() {
        let client = R2Client::from_env().unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("probe.m3u8");
        tokio::fs::write(&path, b"#EXTM3U\n").await.unwrap();

        client
            .upload_file(&path, "videos-hls/connectivity-probe/master.m3u8", "application/vnd.apple.mpegurl")
            .await
            .unwrap();
        let object = client
            .get_object("videos-hls/connectivity-probe/master.m3u8")
            .await
            .unwrap();
        assert_eq!(object.bytes, b"#EXTM3U\n");
    }
}
