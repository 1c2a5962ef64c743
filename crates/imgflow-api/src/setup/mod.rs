//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use imgflow_core::Config;

use crate::state::AppState;
pub use services::BackgroundWorkers;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router, BackgroundWorkers)> {
    crate::telemetry::init_telemetry(config.log_format())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!(environment = config.environment(), "Configuration loaded and validated");

    let pool = database::setup_database(&config).await?;

    let (state, workers) = services::initialize_services(&config, pool);
    validation::prepare_storage(&state.files).await?;

    let router = routes::setup_routes(state.clone());

    Ok((state, router, workers))
}
