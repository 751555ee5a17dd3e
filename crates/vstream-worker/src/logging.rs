//! Structured job logging.

use tracing::{error, info, warn, Span};
use vstream_models::JobName;

/// Stamps `job_name` and `operation` on every job lifecycle event.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_name: String,
    operation: String,
}

impl JobLogger {
    /// Create a logger for a job and operation (e.g. "hls_transcode").
    pub fn new(job_name: &JobName, operation: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_name = %self.job_name,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_name = %self.job_name,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_name = %self.job_name,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_name = %self.job_name,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_name = %self.job_name,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering a whole job run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_name = %self.job_name,
            operation = %self.operation
        )
    }
}
