use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use imgflow_core::{AppError, Stage};
use imgflow_worker::TriggerOutcome;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::parse_id;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TriggerResponse {
    pub message: String,
    /// Output location when the stage is already done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Run one stage on demand
///
/// Answers immediately; poll `/image/{id}/info` for the result. A stage that is
/// processing is not started again, and a stage that is done is not re-run.
#[utoipa::path(
    post,
    path = "/image/{id}/{stage}",
    tag = "images",
    params(
        ("id" = Uuid, Path, description = "Image ID"),
        ("stage" = String, Path, description = "`resize`, `thumbnail` or `watermark`")
    ),
    responses(
        (status = 200, description = "Stage already done", body = TriggerResponse),
        (status = 202, description = "Stage started or already in progress", body = TriggerResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Image or stage not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "trigger_stage"))]
pub async fn trigger_stage(
    State(state): State<Arc<AppState>>,
    Path((id, stage)): Path<(String, String)>,
) -> Result<Response, HttpAppError> {
    let stage: Stage = stage
        .parse()
        .map_err(|_| AppError::NotFound(format!("Unknown stage '{}'", stage)))?;
    let id = parse_id(&id)?;

    let response = match state.dispatcher.trigger(id, stage).await? {
        TriggerOutcome::Started => (
            StatusCode::ACCEPTED,
            Json(TriggerResponse {
                message: format!("{} started", stage),
                path: None,
            }),
        ),
        TriggerOutcome::AlreadyInProgress => (
            StatusCode::ACCEPTED,
            Json(TriggerResponse {
                message: format!("{} already in progress", stage),
                path: None,
            }),
        ),
        TriggerOutcome::AlreadyDone { path } => (
            StatusCode::OK,
            Json(TriggerResponse {
                message: format!("{} already done", stage),
                path: Some(path),
            }),
        ),
    };
    Ok(response.into_response())
}
