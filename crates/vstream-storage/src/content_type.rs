//! Content types for HLS artifacts.

use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for a file, derived from its extension.
pub fn content_type_for(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("m4s") => "video/iso.segment",
        Some("mp4") => "video/mp4",
        Some("aac") => "audio/aac",
        Some("vtt") => "text/vtt",
        _ => OCTET_STREAM,
    }
}
