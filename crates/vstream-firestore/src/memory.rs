//! In-process job store.
//!
//! Records live only as long as the process. Used for local development and
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use vstream_models::{JobName, JobRecord, JobStatus};

use crate::job_store::{JobStore, JobStoreError, JobStoreResult};

/// Job records in a map behind an async lock.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<JobName, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records ever created.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, name: &JobName) -> JobStoreResult<JobRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(name) {
            return Err(JobStoreError::DuplicateJob(name.to_string()));
        }
        let record = JobRecord::new(name.clone());
        records.insert(name.clone(), record.clone());
        Ok(record)
    }

    async fn set_status(
        &self,
        name: &JobName,
        status: JobStatus,
        message: Option<String>,
    ) -> JobStoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(name)
            .ok_or_else(|| JobStoreError::JobNotFound(name.to_string()))?;
        record.set_status(status, message);
        Ok(())
    }

    async fn get(&self, name: &JobName) -> JobStoreResult<JobRecord> {
        self.records
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| JobStoreError::JobNotFound(name.to_string()))
    }

    async fn check_connectivity(&self) -> JobStoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn name(s: &str) -> JobName {
        JobName::from_string(s)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryJobStore::new();
        let created = store.create(&name("abc12345")).await.unwrap();
        assert_eq!(created.status, JobStatus::Pending);

        let fetched = store.get(&name("abc12345")).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_rejected() {
        let store = MemoryJobStore::new();
        store.create(&name("abc12345")).await.unwrap();

        let err = store.create(&name("abc12345")).await.unwrap_err();
        assert!(matches!(err, JobStoreError::DuplicateJob(_)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_status_on_missing_job() {
        let store = MemoryJobStore::new();
        let err = store
            .set_status(&name("missing1"), JobStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get(&name("missing1")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failed_status_keeps_message() {
        let store = MemoryJobStore::new();
        let job = name("abc12345");
        store.create(&job).await.unwrap();
        store.set_status(&job, JobStatus::Processing, None).await.unwrap();
        store
            .set_status(&job, JobStatus::Failed, Some("Encode failed: boom".into()))
            .await
            .unwrap();

        let record = store.get(&job).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.message.as_deref(), Some("Encode failed: boom"));
        assert!(record.updated_at >= record.created_at);
    }

    #[tokio::test]
    async fn test_concurrent_readers_and_writer() {
        let store = Arc::new(MemoryJobStore::new());
        let job = name("abc12345");
        store.create(&job).await.unwrap();

        let writer = {
            let store = Arc::clone(&store);
            let job = job.clone();
            tokio::spawn(async move {
                store.set_status(&job, JobStatus::Processing, None).await.unwrap();
                store.set_status(&job, JobStatus::Success, None).await.unwrap();
            })
        };

        let mut readers = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let job = job.clone();
            readers.push(tokio::spawn(async move { store.get(&job).await.unwrap() }));
        }

        writer.await.unwrap();
        for reader in readers {
            let record = reader.await.unwrap();
            assert_eq!(record.name, job);
        }
        assert_eq!(store.get(&job).await.unwrap().status, JobStatus::Success);
    }
}
