//! Upload, processing, status, and download handlers.

use std::path::{Path as FsPath, PathBuf};

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use vidblur_mask_model::{ProcessingStatus, VideoMask, VideoRecord};
use vidblur_processing::{ProcessingError, Processor, QueueStats};
use vidblur_render_engine::probe_video;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Filename used when an upload does not name itself.
const DEFAULT_UPLOAD_NAME: &str = "video.mp4";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload-video", post(upload_video))
        .route("/process-video", post(process_video))
        .route("/video-status/{id}", get(video_status))
        .route("/processing-queue", get(processing_queue))
        .route("/webhook/video-complete", post(video_complete))
        .route("/download/{id}", get(download_video))
}

fn download_url(video_id: &str) -> String {
    format!("/download/{video_id}")
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub video_id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl From<&VideoRecord> for UploadResponse {
    fn from(record: &VideoRecord) -> Self {
        Self {
            video_id: record.id.clone(),
            filename: record.original_filename.clone(),
            size_bytes: record.size_bytes,
            duration_secs: record.duration_secs,
            width: record.width,
            height: record.height,
        }
    }
}

/// POST /upload-video?filename=<name> -- store the raw body as a new source video.
async fn upload_video(
    State(state): State<AppState>,
    query: Result<Query<UploadParams>, QueryRejection>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let Query(params) = query?;
    if body.is_empty() {
        return Err(AppError::BadRequest("Request body is empty".to_string()));
    }
    let filename = params
        .filename
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());

    let processor = state.processor.clone();
    let ffprobe_bin = state.config.encoder.ffprobe_bin.clone();
    let record = tokio::task::spawn_blocking(move || {
        store_upload(&processor, &ffprobe_bin, &filename, &body)
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Upload task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(&record))))
}

/// Import the bytes, then fill in whatever ffprobe can tell about them.
fn store_upload(
    processor: &Processor,
    ffprobe_bin: &str,
    filename: &str,
    bytes: &[u8],
) -> Result<VideoRecord, ProcessingError> {
    let library = processor.library();
    let mut record = library.import_bytes(filename, bytes, Default::default())?;

    match probe_video(ffprobe_bin, &record.original_path) {
        Some(probed) => {
            record.width = Some(probed.width);
            record.height = Some(probed.height);
            record.duration_secs = probed.duration_secs;
            library.save(&record)?;
            tracing::info!(
                video_id = %record.id,
                width = probed.width,
                height = probed.height,
                duration_secs = ?probed.duration_secs,
                "Probed upload"
            );
        }
        None => tracing::warn!(video_id = %record.id, "Could not probe upload metadata"),
    }
    Ok(record)
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideoRequest {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub blur_masks: Vec<VideoMask>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideoResponse {
    pub success: bool,
    pub message: String,
    pub video_id: String,
    pub status: ProcessingStatus,
    /// `"pass_through"` or `"blur"`.
    pub plan: &'static str,
    pub download_url: String,
}

/// POST /process-video -- validate masks and start rendering in the background.
async fn process_video(
    State(state): State<AppState>,
    payload: Result<Json<ProcessVideoRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ProcessVideoResponse>)> {
    let Json(request) = payload?;
    let video_id = request.video_id.trim().to_string();
    if video_id.is_empty() {
        return Err(AppError::BadRequest("Video ID is required".to_string()));
    }

    let job = state.processor.submit(&video_id, request.blur_masks)?;
    tracing::info!(video_id = %video_id, plan = job.plan, "Processing accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessVideoResponse {
            success: true,
            message: "Video processing started".to_string(),
            download_url: download_url(&video_id),
            video_id,
            status: ProcessingStatus::Processing,
            plan: job.plan,
        }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: ProcessingStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_file_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// GET /video-status/{id} -- live tracker state, else the persisted record.
async fn video_status(State(state): State<AppState>, Path(video_id): Path<String>) -> Response {
    match state.processor.status(&video_id) {
        Ok(report) => {
            let url =
                (report.status == ProcessingStatus::Completed).then(|| download_url(&video_id));
            Json(StatusResponse {
                status: report.status,
                progress: report.progress,
                error: report.error,
                edited_file_path: report.edited_path,
                download_url: url,
            })
            .into_response()
        }
        Err(ProcessingError::VideoNotFound { .. }) => {
            (StatusCode::NOT_FOUND, Json(json!({ "status": "not_found" }))).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

/// GET /processing-queue
async fn processing_queue(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.processor.queue_stats())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCompleteRequest {
    pub video_id: String,
    pub success: bool,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub error: Option<String>,
}

/// POST /webhook/video-complete -- finalize a record rendered elsewhere.
async fn video_complete(
    State(state): State<AppState>,
    payload: Result<Json<VideoCompleteRequest>, JsonRejection>,
) -> AppResult<Json<serde_json::Value>> {
    let Json(request) = payload?;
    let record = state.processor.complete_external(
        &request.video_id,
        request.success,
        request.output_path,
        request.error,
    )?;
    Ok(Json(json!({ "success": true, "status": record.status })))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// GET /download/{id} -- bytes of the edited output.
async fn download_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Response> {
    let record = state
        .processor
        .library()
        .load(&video_id)
        .map_err(ProcessingError::from)?;

    if record.status != ProcessingStatus::Completed {
        return Err(AppError::Conflict(format!(
            "Video {video_id} is {}, not completed",
            record.status
        )));
    }
    let stored = record
        .edited_path
        .clone()
        .ok_or_else(|| AppError::NotFound(format!("Video {video_id} has no edited output")))?;
    let path = state
        .processor
        .library()
        .resolve_edited_artifact(&record, &stored)
        .ok_or_else(|| {
            tracing::warn!(
                video_id = %video_id,
                path = %stored.display(),
                "Edited path is missing or outside the library"
            );
            AppError::NotFound(format!("Edited output for video {video_id} is missing"))
        })?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!(
                "Edited output for video {video_id} is missing"
            )));
        }
        Err(e) => {
            return Err(AppError::InternalError(format!(
                "Failed to read {}: {e}",
                path.display()
            )));
        }
    };

    let disposition = format!("attachment; filename=\"{}\"", record.edited_filename());
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(FsPath::new("a/b_edited.MP4")), "video/mp4");
        assert_eq!(content_type_for(FsPath::new("clip.mov")), "video/quicktime");
        assert_eq!(content_type_for(FsPath::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_process_request_defaults() {
        let request: ProcessVideoRequest =
            serde_json::from_str(r#"{"videoId": "abc"}"#).unwrap();
        assert_eq!(request.video_id, "abc");
        assert!(request.blur_masks.is_empty());
    }
}
