use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use super::parse_id;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Delete an image and its files
///
/// File removal is best effort: files that are already gone or cannot be
/// removed are logged and the record is deleted regardless.
#[utoipa::path(
    delete,
    path = "/image/{id}",
    tag = "images",
    params(("id" = Uuid, Path, description = "Image ID")),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Image not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_image"))]
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpAppError> {
    let id = parse_id(&id)?;
    let record = state.store.get(id).await?;

    let failed = state.files.remove_all(record.file_paths()).await;
    if failed > 0 {
        tracing::warn!(artifact_id = %id, failed, "Some files could not be removed");
    }

    state.store.delete(id).await?;
    tracing::info!(artifact_id = %id, "Image deleted");
    Ok(StatusCode::NO_CONTENT)
}
