//! HLS artifact proxy.
//!
//! Serves `master.m3u8` and variant files straight from the object store.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use vstream_media::hls::MASTER_PLAYLIST;

use crate::error::{ApiError, ApiResult};
use crate::security::is_safe_path_segment;
use crate::state::AppState;

/// `GET /static/video-hls/:id/master.m3u8`
pub async fn serve_master_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    serve_object(&state, &[&id, MASTER_PLAYLIST]).await
}

/// `GET /static/video-hls/:id/:variant/:segment`
pub async fn serve_variant_file(
    State(state): State<AppState>,
    Path((id, variant, segment)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    serve_object(&state, &[&id, &variant, &segment]).await
}

async fn serve_object(state: &AppState, parts: &[&str]) -> ApiResult<Response> {
    if !parts.iter().all(|p| is_safe_path_segment(p)) {
        return Err(ApiError::bad_request("Invalid path"));
    }

    let key = format!("{}/{}", state.worker.config().remote_prefix, parts.join("/"));

    let object = match state.objects.fetch(&key).await {
        Ok(object) => object,
        Err(e) if e.is_not_found() => return Err(ApiError::not_found("Not found")),
        Err(e) => return Err(e.into()),
    };

    let content_type = HeaderValue::from_str(&object.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(object.content_length)),
        ],
        Body::from(object.bytes),
    )
        .into_response())
}
