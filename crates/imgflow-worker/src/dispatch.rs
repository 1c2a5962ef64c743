//! On-demand single-stage triggers.
//!
//! Guard order for `trigger(id, stage)`:
//! 1. a tracked run for (id, stage) is still going: already in progress
//! 2. stored stage status `processing`: already in progress
//! 3. stored stage status `done`: already done, with its output path
//! 4. otherwise claim the stage (`pending | error -> processing`) and spawn
//!    exactly one run; losing the claim falls back to 2 or 3.
//!
//! The caller gets an answer immediately and polls for the result.

use std::sync::Arc;

use imgflow_core::{AppError, ArtifactRecord, Stage, StageStatus};
use imgflow_db::{ArtifactStore, StoreError};
use imgflow_processing::{reconcile_aggregate, StageExecutor};
use uuid::Uuid;

use crate::inflight::InFlightRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Started,
    AlreadyInProgress,
    AlreadyDone { path: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("artifact {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DispatchError::NotFound(id),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotFound(_) => AppError::NotFound("Image not found".to_string()),
            DispatchError::Store(e) => e.into(),
        }
    }
}

#[derive(Clone)]
pub struct StageDispatcher {
    store: Arc<dyn ArtifactStore>,
    executor: StageExecutor,
    registry: InFlightRegistry,
}

impl StageDispatcher {
    pub fn new(executor: StageExecutor, registry: InFlightRegistry) -> Self {
        Self {
            store: executor.store().clone(),
            executor,
            registry,
        }
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    #[tracing::instrument(skip(self), fields(artifact_id = %id, stage = %stage))]
    pub async fn trigger(&self, id: Uuid, stage: Stage) -> Result<TriggerOutcome, DispatchError> {
        let record = self.store.get(id).await?;

        if self.registry.is_running(id, stage) {
            tracing::debug!("Stage run already tracked");
            return Ok(TriggerOutcome::AlreadyInProgress);
        }
        if let Some(outcome) = settled(&record, stage) {
            return Ok(outcome);
        }

        let Some(claimed) = self.store.try_begin_stage(id, stage).await? else {
            let record = self.store.get(id).await?;
            return Ok(settled(&record, stage).unwrap_or(TriggerOutcome::AlreadyInProgress));
        };

        let executor = self.executor.clone();
        let store = self.store.clone();
        let handle = tokio::spawn(async move {
            // Outcome is already recorded on the stage.
            let _ = executor.run_claimed_from_original(&claimed, stage).await;
            if let Err(e) = reconcile_aggregate(store.as_ref(), id).await {
                tracing::error!(artifact_id = %id, error = %e, "Failed to reconcile aggregate status");
            }
        });
        self.registry.track(id, stage, handle);

        tracing::info!("Stage run started");
        Ok(TriggerOutcome::Started)
    }
}

fn settled(record: &ArtifactRecord, stage: Stage) -> Option<TriggerOutcome> {
    match record.stage_status(stage) {
        StageStatus::Processing => Some(TriggerOutcome::AlreadyInProgress),
        StageStatus::Done => Some(TriggerOutcome::AlreadyDone {
            path: record.stage_path(stage).unwrap_or_default().to_string(),
        }),
        StageStatus::Pending | StageStatus::Error => None,
    }
}
