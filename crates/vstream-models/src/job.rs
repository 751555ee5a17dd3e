//! Transcode job identity and record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::JobStatus;

/// Unique name of a transcode job.
///
/// Equal to the staged upload's generated basename, without extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobName(pub String);

impl JobName {
    /// Generate a fresh staging token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive the job name from a staged file path (`.../abc.mp4` -> `abc`).
    pub fn from_staged_path(path: impl AsRef<Path>) -> Option<Self> {
        let stem = path.as_ref().file_stem()?.to_str()?;
        if stem.is_empty() {
            return None;
        }
        Some(Self(stem.to_string()))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted lifecycle record of one transcode job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job name (immutable)
    pub name: JobName,
    /// Current status
    pub status: JobStatus,
    /// Failure diagnostic, set when the job fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Refreshed on every status transition
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a new pending record.
    pub fn new(name: JobName) -> Self {
        let now = Utc::now();
        Self {
            name,
            status: JobStatus::Pending,
            message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the status and bump the updated_at timestamp.
    pub fn set_status(&mut self, status: JobStatus, message: Option<String>) {
        self.status = status;
        if message.is_some() {
            self.message = message;
        }
        self.updated_at = Utc::now();
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
