//! Firestore-backed job records.
//!
//! Each job is the document `<collection>/<name>` with fields `name`,
//! `status`, `message`, `created_at` and `updated_at`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use vstream_models::{JobName, JobRecord, JobStatus};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::job_store::{JobStore, JobStoreError, JobStoreResult};
use crate::types::{Document, ToFirestoreValue, Value};

/// Collection used when `FIRESTORE_JOBS_COLLECTION` is unset.
pub const DEFAULT_JOBS_COLLECTION: &str = "video_status";

/// Document id probed by readiness checks; it need not exist.
const READINESS_PROBE_ID: &str = "readiness-probe";

/// Job store over the Firestore REST client.
#[derive(Clone)]
pub struct FirestoreJobStore {
    client: FirestoreClient,
    collection: String,
}

impl FirestoreJobStore {
    pub fn new(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Read the collection name from `FIRESTORE_JOBS_COLLECTION`.
    pub fn from_env(client: FirestoreClient) -> Self {
        let collection = std::env::var("FIRESTORE_JOBS_COLLECTION")
            .ok()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_JOBS_COLLECTION.to_string());
        Self::new(client, collection)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl JobStore for FirestoreJobStore {
    async fn create(&self, name: &JobName) -> JobStoreResult<JobRecord> {
        let record = JobRecord::new(name.clone());

        self.client
            .create_document(&self.collection, name.as_str(), record_to_fields(&record))
            .await
            .map_err(|e| match e {
                FirestoreError::AlreadyExists(_) => JobStoreError::DuplicateJob(name.to_string()),
                other => other.into(),
            })?;

        info!(job_name = %name, "Created job record");
        Ok(record)
    }

    async fn set_status(
        &self,
        name: &JobName,
        status: JobStatus,
        message: Option<String>,
    ) -> JobStoreResult<()> {
        let mut fields = HashMap::new();
        let mut mask = vec!["status", "updated_at"];
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        if let Some(message) = message {
            fields.insert("message".to_string(), message.to_firestore_value());
            mask.push("message");
        }

        self.client
            .update_document(&self.collection, name.as_str(), fields, &mask, true)
            .await
            .map_err(|e| match e {
                FirestoreError::NotFound(_) => JobStoreError::JobNotFound(name.to_string()),
                other => other.into(),
            })?;

        debug!(job_name = %name, status = %status, "Updated job status");
        Ok(())
    }

    async fn get(&self, name: &JobName) -> JobStoreResult<JobRecord> {
        let doc = self
            .client
            .get_document(&self.collection, name.as_str())
            .await?
            .ok_or_else(|| JobStoreError::JobNotFound(name.to_string()))?;

        Ok(document_to_record(&doc, name)?)
    }

    async fn check_connectivity(&self) -> JobStoreResult<()> {
        self.client
            .get_document(&self.collection, READINESS_PROBE_ID)
            .await?;
        Ok(())
    }
}

fn record_to_fields(record: &JobRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), record.name.as_str().to_firestore_value());
    fields.insert("status".to_string(), record.status.as_str().to_firestore_value());
    fields.insert("message".to_string(), record.message.to_firestore_value());
    fields.insert("created_at".to_string(), record.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), record.updated_at.to_firestore_value());
    fields
}

fn document_to_record(doc: &Document, name: &JobName) -> FirestoreResult<JobRecord> {
    let status_str: String = doc
        .get("status")
        .ok_or_else(|| FirestoreError::InvalidResponse(format!("job {name} has no status")))?;
    let status = JobStatus::parse(&status_str).ok_or_else(|| {
        FirestoreError::InvalidResponse(format!("job {name} has unknown status {status_str}"))
    })?;

    let created_at: DateTime<Utc> = doc
        .get("created_at")
        .ok_or_else(|| FirestoreError::InvalidResponse(format!("job {name} has no created_at")))?;
    let updated_at: DateTime<Utc> = doc.get("updated_at").unwrap_or(created_at);

    Ok(JobRecord {
        name: doc
            .get::<String>("name")
            .map(JobName::from_string)
            .unwrap_or_else(|| name.clone()),
        status,
        message: doc.get("message"),
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FirestoreConfig;
    use crate::retry::RetryConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS_PATH: &str = "/v1/projects/test-project/databases/(default)/documents";

    fn store_for(server: &MockServer) -> FirestoreJobStore {
        let config = FirestoreConfig {
            project_id: "test-project".to_string(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            emulator_host: Some(server.address().to_string()),
        };
        FirestoreJobStore::new(FirestoreClient::new(config).unwrap(), "video_status")
    }

    fn stored_doc(status: &str, message: Option<&str>) -> serde_json::Value {
        let message = match message {
            Some(m) => json!({"stringValue": m}),
            None => json!({"nullValue": null}),
        };
        json!({
            "name": "projects/test-project/databases/(default)/documents/video_status/abc12345",
            "fields": {
                "name": {"stringValue": "abc12345"},
                "status": {"stringValue": status},
                "message": message,
                "created_at": {"timestampValue": "2024-05-01T10:00:00Z"},
                "updated_at": {"timestampValue": "2024-05-01T10:05:00Z"}
            }
        })
    }

    #[tokio::test]
    async fn test_create_posts_pending_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{DOCS_PATH}/video_status")))
            .and(query_param("documentId", "abc12345"))
            .and(body_partial_json(json!({
                "fields": {
                    "name": {"stringValue": "abc12345"},
                    "status": {"stringValue": "pending"}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc("pending", None)))
            .expect(1)
            .mount(&server)
            .await;

        let record = store_for(&server)
            .create(&JobName::from_string("abc12345"))
            .await
            .unwrap();
        assert_eq!(record.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_conflict_is_duplicate_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": {"code": 409, "status": "ALREADY_EXISTS"}
            })))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .create(&JobName::from_string("abc12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobStoreError::DuplicateJob(_)));
    }

    #[tokio::test]
    async fn test_set_status_patches_masked_fields_with_precondition() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{DOCS_PATH}/video_status/abc12345")))
            .and(query_param("currentDocument.exists", "true"))
            .and(query_param("updateMask.fieldPaths", "status"))
            .and(body_partial_json(json!({
                "fields": {
                    "status": {"stringValue": "failed"},
                    "message": {"stringValue": "Encode failed: exit 1"}
                }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(stored_doc("failed", Some("Encode failed: exit 1"))),
            )
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .set_status(
                &JobName::from_string("abc12345"),
                JobStatus::Failed,
                Some("Encode failed: exit 1".to_string()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_status_on_missing_document() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .set_status(&JobName::from_string("abc12345"), JobStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_decodes_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/video_status/abc12345$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc("success", None)))
            .mount(&server)
            .await;

        let record = store_for(&server)
            .get(&JobName::from_string("abc12345"))
            .await
            .unwrap();
        assert_eq!(record.name.as_str(), "abc12345");
        assert_eq!(record.status, JobStatus::Success);
        assert_eq!(record.message, None);
        assert!(record.updated_at > record.created_at);
    }

    #[tokio::test]
    async fn test_get_missing_is_job_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .get(&JobName::from_string("abc12345"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc("processing", None)))
            .mount(&server)
            .await;

        let record = store_for(&server)
            .get(&JobName::from_string("abc12345"))
            .await
            .unwrap();
        assert_eq!(record.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_unknown_status_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_doc("stale", None)))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .get(&JobName::from_string("abc12345"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JobStoreError::Backend(FirestoreError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_connectivity_accepts_missing_probe_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/video_status/readiness-probe$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        store_for(&server).check_connectivity().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires Firestore credentials"]
    async fn test_live_create_and_update() {
        let store = FirestoreJobStore::from_env(FirestoreClient::from_env().unwrap());
        let name = JobName::generate();

        store.create(&name).await.unwrap();
        store
            .set_status(&name, JobStatus::Failed, Some("live probe".to_string()))
            .await
            .unwrap();

        let record = store.get(&name).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.message.as_deref(), Some("live probe"));
    }
}
