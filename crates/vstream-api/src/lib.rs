//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video upload staging and hand-off to the transcode worker
//! - Job status polling
//! - HLS artifact proxying from object storage
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
