use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use imgflow_core::{AppError, ArtifactRecord};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Multipart field carrying the image.
const UPLOAD_FIELD: &str = "image";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub id: Uuid,
    pub message: String,
}

/// Upload an image
///
/// Validates the bytes (sniffed format, size, full decode), stores the original,
/// creates a `pending` record and queues the artifact for processing.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "images",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image accepted for processing", body = UploadResponse),
        (status = 400, description = "Invalid, oversized or corrupt image", body = ErrorResponse),
        (status = 500, description = "Storage, database or queue failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_image"))]
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let data = extract_image_field(multipart).await?;

    // Reject oversize input before paying for a decode.
    state.validator.validate_size(data.len())?;
    let validator = state.validator.clone();
    let (validated, data) = tokio::task::spawn_blocking(move || {
        let validated = validator.validate(&data);
        (validated, data)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Validation task failed: {}", e)))?;
    let validated = validated?;

    let id = Uuid::new_v4();
    let original = state
        .files
        .write_original(id, validated.extension(), &data)
        .await?;
    let original_path = original.to_string_lossy().to_string();

    let record = ArtifactRecord::new(id, original_path.clone());
    if let Err(e) = state.store.save(&record).await {
        state.files.remove_all([original_path.as_str()]).await;
        return Err(e.into());
    }

    // The record stays `pending` if this fails; the stages can still be
    // triggered one by one.
    state.queue.publish(id).await?;

    tracing::info!(
        artifact_id = %id,
        format = validated.extension(),
        width = validated.width,
        height = validated.height,
        size = data.len(),
        "Image uploaded and queued"
    );

    Ok(Json(UploadResponse {
        id,
        message: "Image uploaded, processing started".to_string(),
    }))
}

async fn extract_image_field(mut multipart: Multipart) -> Result<Vec<u8>, AppError> {
    let mut image: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        if image.is_some() {
            return Err(AppError::InvalidInput(format!(
                "Send exactly one field named '{}'",
                UPLOAD_FIELD
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?;
        image = Some(bytes.to_vec());
    }

    image.ok_or_else(|| AppError::InvalidInput(format!("No '{}' field provided", UPLOAD_FIELD)))
}
