//! Video ingestion and job status handlers.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use vstream_models::{JobName, JobRecord, Media};

use crate::error::{ApiError, ApiResult};
use crate::security::is_safe_path_segment;
use crate::services::stage_video;
use crate::state::AppState;

/// Envelope shared by the media endpoints.
#[derive(Debug, Serialize)]
pub struct MediaResponse<T> {
    pub message: &'static str,
    pub result: T,
}

/// `POST /medias/upload-video-hls`
///
/// Stages the `video` part and queues it. Returns the manifest URL right
/// away; it resolves once the job reaches `success`.
pub async fn upload_video_hls(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<MediaResponse<Vec<Media>>>> {
    let staged = stage_video(&state.config, &state.worker.config().staging_dir, multipart).await?;

    let name = match state.worker.enqueue(&staged.path).await {
        Ok(name) => name,
        Err(e) => {
            staged.discard().await;
            return Err(e.into());
        }
    };

    info!(job_name = %name, size_bytes = staged.size_bytes, "Accepted video upload");

    Ok(Json(MediaResponse {
        message: "Upload success",
        result: vec![Media::hls_manifest(
            &state.config.public_base_url,
            name.as_str(),
        )],
    }))
}

/// `GET /medias/video-status/:id`
///
/// Any id without a record yields `result: null`. Ids that could escape the
/// collection path are rejected.
pub async fn get_video_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MediaResponse<Option<JobRecord>>>> {
    if !is_safe_path_segment(&id) {
        return Err(ApiError::bad_request("Invalid video id"));
    }

    let record = match state.jobs.get(&JobName::from_string(id)).await {
        Ok(record) => Some(record),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(MediaResponse {
        message: "Get video status success",
        result: record,
    }))
}
