//! Route configuration and setup

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use imgflow_core::Config;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;
const HTTP_CONCURRENCY_LIMIT: usize = 1024;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    let cors = setup_cors(&state.config);
    let body_limit = state.config.max_file_size_bytes() + MULTIPART_OVERHEAD_BYTES;
    let files = ServeDir::new(state.files.root());

    let api = Router::new()
        .route("/upload", post(handlers::image_upload::upload_image))
        .route("/images", get(handlers::image_get::list_images))
        .route(
            "/image/{id}",
            get(handlers::image_get::get_image).delete(handlers::image_delete::delete_image),
        )
        .route("/image/{id}/info", get(handlers::image_get::get_image_info))
        .route(
            "/image/{id}/original",
            get(handlers::image_download::download_original),
        )
        .route(
            "/image/{id}/{variant}",
            get(handlers::image_download::download_variant)
                .post(handlers::stage_trigger::trigger_stage),
        )
        .route("/health", get(handlers::health::health_check))
        .route("/api/openapi.json", get(openapi_json));

    api.nest_service("/files", files)
        .merge(
            utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    Json(ApiDoc::openapi())
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    if config.cors_origins().iter().any(|o| o == "*") {
        if config.is_production() {
            tracing::warn!("CORS configured to allow all origins in production");
        }
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}
