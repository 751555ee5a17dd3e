//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vstream_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vstream_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vstream_http_requests_in_flight";

    // Ingestion metrics
    pub const UPLOADS_ACCEPTED_TOTAL: &str = "vstream_uploads_accepted_total";
    pub const UPLOADS_REJECTED_TOTAL: &str = "vstream_uploads_rejected_total";
    pub const UPLOAD_BYTES_TOTAL: &str = "vstream_upload_bytes_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vstream_rate_limit_hits_total";
}

static STATUS_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/video-status/[^/]+").expect("valid regex"));
static HLS_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/video-hls/[^/]+").expect("valid regex"));
static VARIANT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/video-hls/:id/[^/]+/[^/]+$").expect("valid regex"));

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a staged upload handed to the worker.
pub fn record_upload_accepted(bytes: u64) {
    counter!(names::UPLOADS_ACCEPTED_TOTAL).increment(1);
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
}

/// Record an upload rejected before staging completed.
pub fn record_upload_rejected(reason: &'static str) {
    counter!(names::UPLOADS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (remove job ids and segment names).
fn sanitize_path(path: &str) -> String {
    let path = STATUS_ID.replace_all(path, "/video-status/:id");
    let path = HLS_ID.replace_all(&path, "/video-hls/:id");
    let path = VARIANT_SEGMENT.replace_all(&path, "/video-hls/:id/:variant/:segment");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
