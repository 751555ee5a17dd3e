//! Media descriptors returned to uploading clients.

use serde::{Deserialize, Serialize};

/// Kind of media behind a returned URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Hls,
}

/// A media URL with its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

impl Media {
    /// HLS manifest URL for a job, valid once the job succeeds.
    pub fn hls_manifest(public_base_url: &str, job_name: &str) -> Self {
        Self {
            url: format!(
                "{}/static/video-hls/{}/master.m3u8",
                public_base_url.trim_end_matches('/'),
                job_name
            ),
            media_type: MediaType::Hls,
        }
    }
}
