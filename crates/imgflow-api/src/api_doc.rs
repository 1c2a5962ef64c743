//! OpenAPI documentation, served at `/api/openapi.json` and browsable at `/docs`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use imgflow_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Imgflow API",
        version = "0.1.0",
        description = "Image upload with asynchronous resize, thumbnail and watermark stages. Clients poll for per-stage and aggregate status."
    ),
    paths(
        handlers::image_upload::upload_image,
        handlers::image_get::get_image,
        handlers::image_get::get_image_info,
        handlers::image_get::list_images,
        handlers::image_download::download_original,
        handlers::image_download::download_variant,
        handlers::stage_trigger::trigger_stage,
        handlers::image_delete::delete_image,
        handlers::health::health_check,
    ),
    components(schemas(
        models::ArtifactResponse,
        models::ArtifactStatus,
        models::StageStatus,
        models::Stage,
        handlers::image_upload::UploadResponse,
        handlers::image_get::ProcessingStatusResponse,
        handlers::stage_trigger::TriggerResponse,
        handlers::health::HealthResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "images", description = "Upload, status, delivery and stage triggers"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
