//! API configuration.

use std::path::PathBuf;

use tracing::warn;

/// Where uploaded HLS artifacts are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    R2,
    Local,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "r2" => Some(Self::R2),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Where job records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStoreBackend {
    Firestore,
    Memory,
}

impl JobStoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "firestore" => Some(Self::Firestore),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Per-IP requests per second on media routes
    pub rate_limit_rps: u32,
    /// Environment (development/production)
    pub environment: String,
    /// Prefix of returned manifest URLs
    pub public_base_url: String,
    /// Largest accepted video upload
    pub max_video_size_bytes: u64,
    /// Accepted `Content-Type`s of the video part
    pub allowed_video_types: Vec<String>,
    pub storage_backend: StorageBackend,
    /// Root of the local object store
    pub local_storage_root: PathBuf,
    pub job_store_backend: JobStoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            environment: "development".to_string(),
            public_base_url: "http://localhost:4000".to_string(),
            max_video_size_bytes: 50 * 1024 * 1024, // 50MB
            allowed_video_types: vec!["video/mp4".to_string(), "video/quicktime".to_string()],
            storage_backend: StorageBackend::Local,
            local_storage_root: PathBuf::from("./storage"),
            job_store_backend: JobStoreBackend::Memory,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("API_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port,
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            max_video_size_bytes: std::env::var("MAX_VIDEO_SIZE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_video_size_bytes),
            allowed_video_types: std::env::var("ALLOWED_VIDEO_TYPES")
                .map(|s| {
                    s.split(',')
                        .map(|t| t.trim().to_lowercase())
                        .filter(|t| !t.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.allowed_video_types),
            storage_backend: backend_from_env(
                "STORAGE_BACKEND",
                StorageBackend::parse,
                defaults.storage_backend,
            ),
            local_storage_root: std::env::var("LOCAL_STORAGE_ROOT")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.local_storage_root),
            job_store_backend: backend_from_env(
                "JOB_STORE_BACKEND",
                JobStoreBackend::parse,
                defaults.job_store_backend,
            ),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    pub fn is_allowed_video_type(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        self.allowed_video_types.iter().any(|t| *t == essence)
    }
}

fn backend_from_env<T: Copy + std::fmt::Debug>(
    var: &str,
    parse: fn(&str) -> Option<T>,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(value) => parse(&value).unwrap_or_else(|| {
            warn!("Unknown {}={:?}, using {:?}", var, value, default);
            default
        }),
        Err(_) => default,
    }
}
