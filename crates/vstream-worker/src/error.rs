//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid staged path: {0}")]
    InvalidPath(String),

    #[error("Failed to list encode output: {0}")]
    ListingFailed(String),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    JobStore(#[from] vstream_firestore::JobStoreError),

    #[error(transparent)]
    Media(#[from] vstream_media::MediaError),

    #[error(transparent)]
    Storage(#[from] vstream_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    pub fn listing_failed(msg: impl Into<String>) -> Self {
        Self::ListingFailed(msg.into())
    }

    /// Pipeline stage the error came from, used as a metric label.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::Media(_) => "encode",
            WorkerError::ListingFailed(_) => "list",
            WorkerError::Storage(_) => "upload",
            WorkerError::Io(_) => "cleanup",
            WorkerError::InvalidPath(_) => "admission",
            WorkerError::JobStore(_) => "store",
            WorkerError::Panicked(_) => "panic",
        }
    }

    /// True when the job store rejected a second record for the same name.
    pub fn is_duplicate_job(&self) -> bool {
        matches!(
            self,
            WorkerError::JobStore(vstream_firestore::JobStoreError::DuplicateJob(_))
        )
    }
}
