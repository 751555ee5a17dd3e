//! Local filesystem object store.
//!
//! Objects live at `<root>/<key>`. Content types are derived from the key's
//! extension on read.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::content_type::content_type_for;
use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectStore, StoredObject};

/// Stores objects under a directory on local disk.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path, rejecting anything that escapes the root.
    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }

        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(&self, local: &Path, key: &str, _content_type: &str) -> StorageResult<()> {
        let dest = self.resolve(key)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(local, &dest)
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", local.display(), e)))?;

        debug!("Stored {} at {}", local.display(), dest.display());
        Ok(())
    }

    async fn fetch(&self, key: &str) -> StorageResult<StoredObject> {
        let path = self.resolve(key)?;

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(key));
            }
            Err(e) => return Err(StorageError::download_failed(format!("{key}: {e}"))),
        };

        Ok(StoredObject {
            content_length: bytes.len() as u64,
            content_type: content_type_for(&path).to_string(),
            bytes,
        })
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}
