//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root under which each upload gets its own directory
    pub staging_dir: PathBuf,
    /// Remote key prefix for uploaded artifacts
    pub remote_prefix: String,
    /// Kill an encode after this long; `None` waits indefinitely
    pub encode_timeout: Option<Duration>,
    /// How long shutdown waits for the queue to drain
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./uploads/videos"),
            remote_prefix: "videos-hls".to_string(),
            encode_timeout: None,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            staging_dir: std::env::var("VIDEO_STAGING_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            remote_prefix: std::env::var("HLS_REMOTE_PREFIX")
                .ok()
                .map(|s| s.trim_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.remote_prefix),
            encode_timeout: std::env::var("WORKER_ENCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            shutdown_timeout: std::env::var("WORKER_SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
        }
    }
}
