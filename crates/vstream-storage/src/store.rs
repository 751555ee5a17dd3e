//! The object store capability.

use async_trait::async_trait;
use std::path::Path;

use crate::error::StorageResult;

/// An object read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub content_length: u64,
}

/// Remote storage for finished HLS artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy the file at `local` to `key`, overwriting any existing object.
    async fn upload(&self, local: &Path, key: &str, content_type: &str) -> StorageResult<()>;

    /// Read an object back. Missing keys yield `StorageError::NotFound`.
    async fn fetch(&self, key: &str) -> StorageResult<StoredObject>;

    /// Cheap reachability probe for readiness checks.
    async fn check_connectivity(&self) -> StorageResult<()>;
}
