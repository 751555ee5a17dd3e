//! Input validation for path parameters and uploaded file names.

/// Longest accepted path segment in artifact routes.
const MAX_SEGMENT_LENGTH: usize = 128;

/// Longest accepted file extension, without the dot.
const MAX_EXTENSION_LENGTH: usize = 8;

/// Whether a decoded path parameter is safe to splice into an object key.
pub fn is_safe_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.len() <= MAX_SEGMENT_LENGTH
        && !segment.contains("..")
        && !segment.contains('/')
        && !segment.contains('\\')
        && !segment.chars().any(char::is_control)
}

/// Lower-cased extension of an uploaded file name, if it looks sane.
pub fn sanitize_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LENGTH
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Extension implied by a video content type.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        "video/x-matroska" => Some("mkv"),
        "video/x-msvideo" => Some("avi"),
        _ => None,
    }
}
