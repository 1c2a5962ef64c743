//! Metadata store for artifact records.
//!
//! Whole-record `save`/`update` exist for creation and for the decode-failure
//! path. Stage runs go through the per-field operations (`try_begin_stage`,
//! `set_stage`, `set_status`, `transition_status`) so that two stages finishing
//! at the same time never overwrite each other's columns.

mod memory;
mod postgres;

pub use memory::InMemoryArtifactStore;
pub use postgres::ArtifactRepository;

use async_trait::async_trait;
use imgflow_core::{ArtifactRecord, ArtifactStatus, Stage, StageStatus};
use uuid::Uuid;

use crate::error::StoreError;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Insert a new record.
    async fn save(&self, record: &ArtifactRecord) -> Result<(), StoreError>;

    /// Fetch a record; [`StoreError::NotFound`] if absent.
    async fn get(&self, id: Uuid) -> Result<ArtifactRecord, StoreError>;

    /// Overwrite all status and path fields of an existing record.
    async fn update(&self, record: &ArtifactRecord) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ArtifactRecord>, StoreError>;

    /// Move the aggregate from `pending` to `processing`. Returns `false` when the
    /// aggregate was in any other state.
    async fn try_begin_pipeline(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Claim one stage: `pending | error -> processing`, clearing its path.
    /// Returns the updated record, or `None` when the stage was not startable.
    async fn try_begin_stage(
        &self,
        id: Uuid,
        stage: Stage,
    ) -> Result<Option<ArtifactRecord>, StoreError>;

    /// Write one stage's status and path. The path is stored only for `done`.
    async fn set_stage(
        &self,
        id: Uuid,
        stage: Stage,
        status: StageStatus,
        path: Option<&str>,
    ) -> Result<ArtifactRecord, StoreError>;

    /// Write the aggregate status only.
    async fn set_status(&self, id: Uuid, status: ArtifactStatus) -> Result<(), StoreError>;

    /// Compare-and-set on the aggregate. Returns whether `from` matched.
    async fn transition_status(
        &self,
        id: Uuid,
        from: ArtifactStatus,
        to: ArtifactStatus,
    ) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

fn stored_path(status: StageStatus, path: Option<&str>) -> Option<String> {
    match status {
        StageStatus::Done => path.filter(|p| !p.is_empty()).map(str::to_string),
        _ => None,
    }
}
