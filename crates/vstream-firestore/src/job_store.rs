//! The job record store capability.

use async_trait::async_trait;
use thiserror::Error;
use vstream_models::{JobName, JobRecord, JobStatus};

use crate::error::FirestoreError;

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Errors surfaced by a job store.
#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job already exists: {0}")]
    DuplicateJob(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job store backend error: {0}")]
    Backend(#[from] FirestoreError),
}

impl JobStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound(_))
    }
}

/// Persistence for job records.
///
/// Implementations must tolerate the status endpoint reading while the worker
/// writes. Each job owns exactly one record, so single-record atomicity is
/// enough.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `Pending` record stamped with the current time.
    async fn create(&self, name: &JobName) -> JobStoreResult<JobRecord>;

    /// Move a record to `status` and refresh `updated_at`.
    ///
    /// `message` is stored alongside when present.
    async fn set_status(
        &self,
        name: &JobName,
        status: JobStatus,
        message: Option<String>,
    ) -> JobStoreResult<()>;

    /// Fetch the current record.
    async fn get(&self, name: &JobName) -> JobStoreResult<JobRecord>;

    /// Reachability probe for readiness checks.
    async fn check_connectivity(&self) -> JobStoreResult<()>;
}
