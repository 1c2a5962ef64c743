use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use imgflow_core::{AppError, ArtifactResponse, ArtifactStatus};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::image_download::serve_file;
use super::parse_id;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// Returned while the artifact is not yet `done`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcessingStatusResponse {
    pub id: Uuid,
    pub status: ArtifactStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationQuery {
    /// Page size, clamped to 1..=100
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Processed image, or the current status while processing
#[utoipa::path(
    get,
    path = "/image/{id}",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Resized image", content_type = "image/jpeg"),
        (status = 202, description = "Not processed yet", body = ProcessingStatusResponse),
        (status = 404, description = "Image or file not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "get_image"))]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, HttpAppError> {
    let id = parse_id(&id)?;
    let record = state.store.get(id).await?;

    if record.status != ArtifactStatus::Done {
        return Ok((
            StatusCode::ACCEPTED,
            Json(ProcessingStatusResponse {
                id,
                status: record.status,
            }),
        )
            .into_response());
    }

    let path = record
        .processed_path
        .ok_or_else(|| AppError::NotFound("Processed image not found".to_string()))?;
    Ok(serve_file(&path)
        .await?
        .ok_or_else(|| AppError::NotFound("Processed image not found".to_string()))?)
}

/// Full record: aggregate and per-stage statuses and output paths
#[utoipa::path(
    get,
    path = "/image/{id}/info",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image record", body = ArtifactResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse)
    )
)]
pub async fn get_image_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ArtifactResponse>, HttpAppError> {
    let id = parse_id(&id)?;
    let record = state.store.get(id).await?;
    Ok(Json(record.into()))
}

/// Newest images first
#[utoipa::path(
    get,
    path = "/images",
    tag = "images",
    params(PaginationQuery),
    responses(
        (status = 200, description = "List of images", body = Vec<ArtifactResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_images(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<Vec<ArtifactResponse>>, HttpAppError> {
    let limit = pagination.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = pagination.offset.unwrap_or(0).max(0);

    let records = state.store.list(limit, offset).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
