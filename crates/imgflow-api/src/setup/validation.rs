//! Startup checks beyond what `Config::validate` covers.

use anyhow::{Context, Result};
use imgflow_core::Config;

pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.db_max_connections() == 0 {
        return Err(anyhow::anyhow!("Database max connections cannot be 0"));
    }
    if config.db_timeout_seconds() == 0 {
        return Err(anyhow::anyhow!("Database timeout cannot be 0"));
    }

    let watermark = &config.processing().watermark_path;
    if !watermark.is_file() {
        tracing::warn!(
            path = %watermark.display(),
            "Watermark overlay not found; the watermark stage will fail until it exists"
        );
    }

    Ok(())
}

/// Create the storage directories up front so an unwritable path fails startup.
pub async fn prepare_storage(files: &imgflow_processing::ArtifactFiles) -> Result<()> {
    files
        .ensure_dirs()
        .await
        .with_context(|| format!("Failed to create storage under {}", files.root().display()))
}
