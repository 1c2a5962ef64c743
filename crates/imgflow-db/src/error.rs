use imgflow_core::AppError;
use uuid::Uuid;

/// Errors returned by [`crate::ArtifactStore`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact {0} not found")]
    NotFound(Uuid),

    #[error("artifact {0} already exists")]
    AlreadyExists(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound("Image not found".to_string()),
            StoreError::AlreadyExists(id) => AppError::Internal(format!("Image {} already exists", id)),
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Errors returned by [`crate::ArtifactQueue`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queue closed")]
    Closed,
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::Queue(err.to_string())
    }
}
