//! Worker metrics.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Metric name constants.
pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "vstream_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vstream_jobs_completed_total";
    /// Labelled by the failing stage.
    pub const JOBS_FAILED_TOTAL: &str = "vstream_jobs_failed_total";
    pub const ENCODE_DURATION_SECONDS: &str = "vstream_encode_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "vstream_upload_duration_seconds";
    pub const QUEUE_PENDING: &str = "vstream_queue_pending";
    /// Status writes that failed and were swallowed.
    pub const STATUS_UPDATE_FAILURES_TOTAL: &str = "vstream_status_update_failures_total";
}

pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed(stage: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "stage" => stage).increment(1);
}

pub fn record_encode_duration(elapsed: Duration) {
    histogram!(names::ENCODE_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_upload_duration(elapsed: Duration) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn set_pending(len: usize) {
    gauge!(names::QUEUE_PENDING).set(len as f64);
}

pub fn record_status_update_failure(status: &'static str) {
    counter!(names::STATUS_UPDATE_FAILURES_TOTAL, "status" => status).increment(1);
}
