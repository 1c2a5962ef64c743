//! Pipeline orchestrator: all three stages for one artifact.
//!
//! ```text
//! pending --(start)--> processing --(0 failed)---> done
//!                                 |--(1-2 failed)-> partial
//!                                 |--(3 failed)---> error
//! pending --(decode failure)--> error
//! ```
//!
//! Starting is a compare-and-set on the aggregate, so a redelivered trigger for
//! an artifact that is not `pending` does nothing. The final aggregate is read
//! off the stored stage statuses, never counted from this run's results: a stage
//! may have been finished, or still be held, by an on-demand run.

use std::sync::Arc;

use imgflow_core::{ArtifactStatus, Stage, StageStatus};
use imgflow_db::{ArtifactStore, StoreError};
use uuid::Uuid;

use crate::executor::{StageError, StageExecutor};
use crate::image::decode_file;
use crate::transform::TransformError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every stage finished successfully.
    Completed,
    /// The artifact was not `pending`; nothing was changed.
    Skipped { status: ArtifactStatus },
    /// Some stages were still held by on-demand runs when this run finished.
    /// The aggregate went back to `pending` and those runs settle it.
    HandedOff { unfinished: Vec<Stage> },
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("source image could not be decoded: {0}")]
    Decode(#[source] TransformError),

    /// Some stages failed. The record already reflects the partial result.
    #[error("stages failed: {}", format_stages(.failed))]
    StagesFailed {
        failed: Vec<Stage>,
        status: ArtifactStatus,
    },
}

fn format_stages(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(Stage::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// How a pipeline run left the aggregate.
enum Settled {
    Final {
        status: ArtifactStatus,
        failed: Vec<Stage>,
    },
    HandedOff {
        unfinished: Vec<Stage>,
    },
}

/// Bring the aggregate in line with the stage statuses once all three have
/// finished. An aggregate of `processing` belongs to a running pipeline and is
/// left alone. The write is a compare-and-set from the value just read.
///
/// Returns the aggregate when it agrees with the stages afterwards.
pub async fn reconcile_aggregate(
    store: &dyn ArtifactStore,
    id: Uuid,
) -> Result<Option<ArtifactStatus>, StoreError> {
    let record = store.get(id).await?;
    if record.status == ArtifactStatus::Processing {
        return Ok(None);
    }
    let Some(status) = record.reconciled_status() else {
        return Ok(None);
    };
    if status == record.status {
        return Ok(Some(status));
    }
    if store.transition_status(id, record.status, status).await? {
        tracing::info!(artifact_id = %id, from = %record.status, to = %status, "Aggregate status reconciled");
        return Ok(Some(status));
    }

    // Another writer got there first.
    let current = store.get(id).await?;
    Ok((current.reconciled_status() == Some(current.status)).then_some(current.status))
}

#[derive(Clone)]
pub struct PipelineOrchestrator {
    store: Arc<dyn ArtifactStore>,
    executor: StageExecutor,
}

impl PipelineOrchestrator {
    pub fn new(executor: StageExecutor) -> Self {
        Self {
            store: executor.store().clone(),
            executor,
        }
    }

    pub fn executor(&self) -> &StageExecutor {
        &self.executor
    }

    #[tracing::instrument(skip(self), fields(artifact_id = %id))]
    pub async fn run(&self, id: Uuid) -> Result<PipelineOutcome, PipelineError> {
        let record = self.store.get(id).await?;
        if record.status != ArtifactStatus::Pending {
            tracing::debug!(status = %record.status, "Artifact not pending, skipping pipeline");
            return Ok(PipelineOutcome::Skipped {
                status: record.status,
            });
        }
        if !self.store.try_begin_pipeline(id).await? {
            tracing::debug!("Lost pipeline claim, skipping");
            return Ok(PipelineOutcome::Skipped {
                status: self.store.get(id).await?.status,
            });
        }
        tracing::info!("Pipeline started");

        let source = match decode_file(&record.original_path).await {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(error = %e, "Source decode failed, marking open stages as error");
                self.fail_open_stages(id).await?;
                self.settle(id).await?;
                return Err(PipelineError::Decode(e));
            }
        };

        let runs = Stage::ALL.map(|stage| {
            let executor = self.executor.clone();
            let source = source.clone();
            async move { (stage, executor.run(id, stage, source).await) }
        });
        for (stage, result) in futures::future::join_all(runs).await {
            match result {
                Ok(_) => {}
                Err(StageError::NotStartable { status, .. }) => {
                    tracing::debug!(stage = %stage, status = %status, "Stage held by another run");
                }
                // Recorded on the stage by the executor.
                Err(StageError::Transform { .. } | StageError::Io { .. }) => {}
                Err(e @ StageError::Store { .. }) => {
                    tracing::warn!(stage = %stage, error = %e, "Stage could not be recorded");
                }
            }
        }

        match self.settle(id).await? {
            Settled::Final { status, .. } if status == ArtifactStatus::Done => {
                tracing::info!(status = %status, "Pipeline completed");
                Ok(PipelineOutcome::Completed)
            }
            Settled::Final { status, failed } => {
                tracing::warn!(
                    status = %status,
                    failed = %format_stages(&failed),
                    "Pipeline finished with failed stages"
                );
                Err(PipelineError::StagesFailed { failed, status })
            }
            Settled::HandedOff { unfinished } => {
                tracing::info!(
                    unfinished = %format_stages(&unfinished),
                    "Pipeline finished, stages still running elsewhere"
                );
                Ok(PipelineOutcome::HandedOff { unfinished })
            }
        }
    }

    /// Mark every stage nobody holds as `error`. Stages that are `done` or
    /// `processing` keep their state.
    async fn fail_open_stages(&self, id: Uuid) -> Result<(), StoreError> {
        for stage in Stage::ALL {
            if self.store.try_begin_stage(id, stage).await?.is_some() {
                self.store
                    .set_stage(id, stage, StageStatus::Error, None)
                    .await?;
            }
        }
        Ok(())
    }

    /// Release `processing`: write the aggregate the stored stages imply, or
    /// hand it back to `pending` while other runs still hold stages.
    async fn settle(&self, id: Uuid) -> Result<Settled, StoreError> {
        let record = self.store.get(id).await?;
        if let Some(status) = record.reconciled_status() {
            if !self
                .store
                .transition_status(id, ArtifactStatus::Processing, status)
                .await?
            {
                tracing::warn!(status = %status, "Aggregate left processing during the run");
            }
            return Ok(Settled::Final {
                status,
                failed: record.failed_stages(),
            });
        }

        let unfinished: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(|stage| !record.stage_status(*stage).is_terminal())
            .collect();
        self.store
            .transition_status(id, ArtifactStatus::Processing, ArtifactStatus::Pending)
            .await?;

        // A run that finished after the read above skipped its own reconcile.
        match reconcile_aggregate(self.store.as_ref(), id).await? {
            Some(status) => Ok(Settled::Final {
                status,
                failed: self.store.get(id).await?.failed_stages(),
            }),
            None => Ok(Settled::HandedOff { unfinished }),
        }
    }
}
