use std::io;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use imgflow_core::{AppError, ArtifactRecord, Stage, StageStatus};

use super::parse_id;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Read a stored file into a response. `Ok(None)` when the file is gone.
pub(crate) async fn serve_file(path: &str) -> Result<Option<Response>, AppError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path, "Stored file missing");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(bytes))
        .map(Some)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

fn content_type_for(path: &str) -> &'static str {
    let extension = FsPath::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

async fn serve_original(record: &ArtifactRecord) -> Result<Response, AppError> {
    serve_file(&record.original_path)
        .await?
        .ok_or_else(|| AppError::NotFound("Original image not found".to_string()))
}

/// Uploaded original bytes
#[utoipa::path(
    get,
    path = "/image/{id}/original",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Original image"),
        (status = 404, description = "Image or file not found", body = ErrorResponse)
    )
)]
pub async fn download_original(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    let record = state.store.get(parse_id(&id)?).await?;
    Ok(serve_original(&record).await?)
}

/// Thumbnail or watermarked output, falling back to the original until the
/// stage is done
#[utoipa::path(
    get,
    path = "/image/{id}/{variant}",
    tag = "images",
    params(
        ("id" = Uuid, Path, description = "Image ID"),
        ("variant" = String, Path, description = "`thumbnail` or `watermarked`")
    ),
    responses(
        (status = 200, description = "Stage output, or the original as fallback"),
        (status = 404, description = "Image, variant or file not found", body = ErrorResponse)
    )
)]
pub async fn download_variant(
    State(state): State<Arc<AppState>>,
    Path((id, variant)): Path<(String, String)>,
) -> Result<Response, HttpAppError> {
    let stage = match variant.as_str() {
        "thumbnail" => Stage::Thumbnail,
        "watermarked" => Stage::Watermark,
        _ => return Err(AppError::NotFound(format!("Unknown image variant '{}'", variant)).into()),
    };
    let record = state.store.get(parse_id(&id)?).await?;

    if record.stage_status(stage) == StageStatus::Done {
        if let Some(path) = record.stage_path(stage) {
            if let Some(response) = serve_file(path).await? {
                return Ok(response);
            }
            tracing::warn!(artifact_id = %record.id, stage = %stage, "Stage output missing, serving original");
        }
    }

    Ok(serve_original(&record).await?)
}
