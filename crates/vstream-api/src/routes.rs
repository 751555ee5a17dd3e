//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    get_video_status, health, ready, serve_master_playlist, serve_variant_file, upload_video_hls,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the video itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let upload_limit = usize::try_from(
        state
            .config
            .max_video_size_bytes
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    // Streamed to disk, so axum's buffered-body default does not apply
    let upload_routes = Router::new()
        .route("/medias/upload-video-hls", post(upload_video_hls))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(upload_limit));

    let media_routes = Router::new()
        .merge(upload_routes)
        .route("/medias/video-status/:id", get(get_video_status))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let static_routes = Router::new()
        .route("/static/video-hls/:id/master.m3u8", get(serve_master_playlist))
        .route(
            "/static/video-hls/:id/:variant/:segment",
            get(serve_variant_file),
        );

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(media_routes)
        .merge(static_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
