//! Video upload staging.
//!
//! Each accepted upload lands at `<staging>/<token>/<token>.<ext>`, streamed
//! through a `.part` file while its size is enforced. The token doubles as
//! the job name.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use vstream_media::fs_utils::{move_file, remove_dir_all_if_exists};
use vstream_models::JobName;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{extension_for_content_type, sanitize_extension};

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

/// A staged upload ready to be handed to the worker.
#[derive(Debug, Clone)]
pub struct StagedVideo {
    pub name: JobName,
    /// `<staging>/<token>/`
    pub dir: PathBuf,
    /// `<staging>/<token>/<token>.<ext>`
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl StagedVideo {
    /// Delete the staging directory after a failed hand-off.
    pub async fn discard(&self) {
        if let Err(e) = remove_dir_all_if_exists(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "Failed to discard staged upload");
        }
    }
}

/// Read the multipart body and stage its single `video` part.
pub async fn stage_video(
    config: &ApiConfig,
    staging_root: &Path,
    mut multipart: Multipart,
) -> ApiResult<StagedVideo> {
    let mut staged: Option<StagedVideo> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return reject(staged, "malformed", format!("Malformed multipart body: {e}")).await
            }
        };

        let field_name = field.name().unwrap_or_default().to_string();
        if field_name != VIDEO_FIELD {
            return reject(
                staged,
                "unexpected_field",
                format!("Unexpected field `{field_name}`, expected `{VIDEO_FIELD}`"),
            )
            .await;
        }
        if staged.is_some() {
            return reject(staged, "multiple_files", "Only one video file is allowed").await;
        }

        staged = Some(stage_field(config, staging_root, field).await?);
    }

    match staged {
        Some(video) => {
            metrics::record_upload_accepted(video.size_bytes);
            Ok(video)
        }
        None => {
            metrics::record_upload_rejected("missing_file");
            Err(ApiError::invalid_upload(format!(
                "Missing `{VIDEO_FIELD}` file"
            )))
        }
    }
}

async fn reject<T>(
    staged: Option<StagedVideo>,
    reason: &'static str,
    message: impl Into<String>,
) -> ApiResult<T> {
    if let Some(video) = staged {
        video.discard().await;
    }
    metrics::record_upload_rejected(reason);
    Err(ApiError::invalid_upload(message))
}

async fn stage_field(
    config: &ApiConfig,
    staging_root: &Path,
    field: Field<'_>,
) -> ApiResult<StagedVideo> {
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !config.is_allowed_video_type(&content_type) {
        metrics::record_upload_rejected("content_type");
        return Err(ApiError::invalid_upload(format!(
            "Unsupported video type `{content_type}`"
        )));
    }

    let ext = field
        .file_name()
        .and_then(sanitize_extension)
        .or_else(|| extension_for_content_type(&content_type).map(str::to_string))
        .ok_or_else(|| {
            metrics::record_upload_rejected("extension");
            ApiError::invalid_upload("Cannot determine the video file extension")
        })?;

    let name = JobName::generate();
    let dir = staging_root.join(name.as_str());
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create staging dir: {e}")))?;

    let part_path = dir.join(format!("{name}.part"));
    let final_path = dir.join(format!("{name}.{ext}"));

    let size_bytes = match write_part(field, &part_path, config.max_video_size_bytes).await {
        Ok(size) => size,
        Err(e) => {
            if let Err(cleanup) = remove_dir_all_if_exists(&dir).await {
                warn!(dir = %dir.display(), error = %cleanup, "Failed to remove rejected upload");
            }
            return Err(e);
        }
    };

    if let Err(e) = move_file(&part_path, &final_path).await {
        if let Err(cleanup) = remove_dir_all_if_exists(&dir).await {
            warn!(dir = %dir.display(), error = %cleanup, "Failed to remove unfinished upload");
        }
        return Err(ApiError::internal(format!("Failed to finalize upload: {e}")));
    }

    debug!(job_name = %name, size_bytes, path = %final_path.display(), "Staged upload");

    Ok(StagedVideo {
        name,
        dir,
        path: final_path,
        size_bytes,
    })
}

/// Stream a field to disk, failing once it exceeds `max_bytes`.
async fn write_part(mut field: Field<'_>, path: &Path, max_bytes: u64) -> ApiResult<u64> {
    let mut file = File::create(path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create staged file: {e}")))?;
    let mut written: u64 = 0;

    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                metrics::record_upload_rejected("malformed");
                return Err(ApiError::invalid_upload(format!(
                    "Upload interrupted: {e}"
                )));
            }
        };

        written += chunk.len() as u64;
        if written > max_bytes {
            metrics::record_upload_rejected("too_large");
            return Err(ApiError::invalid_upload(format!(
                "Video exceeds the maximum size of {max_bytes} bytes"
            )));
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write staged file: {e}")))?;
    }

    if written == 0 {
        metrics::record_upload_rejected("empty");
        return Err(ApiError::invalid_upload("Video file is empty"));
    }

    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to flush staged file: {e}")))?;

    Ok(written)
}
