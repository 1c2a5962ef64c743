pub mod health;
pub mod image_delete;
pub mod image_download;
pub mod image_get;
pub mod image_upload;
pub mod stage_trigger;

use imgflow_core::AppError;
use uuid::Uuid;

/// Path ids are parsed by hand so a malformed id gets the JSON error body.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Ok(Uuid::parse_str(raw)?)
}
