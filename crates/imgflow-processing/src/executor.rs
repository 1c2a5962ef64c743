//! Stage executor: runs one stage for one artifact and records the result.
//!
//! Ordering within a run: the `processing` write happens before the transform,
//! which happens before the terminal write. Failures are written to the stage's
//! status and returned as a [`StageError`] value; nothing here panics or bubbles
//! up a fault that would take down the caller.

use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use imgflow_core::{ArtifactRecord, Stage, StageStatus};
use imgflow_db::{ArtifactStore, StoreError};
use uuid::Uuid;

use crate::files::{self, ArtifactFiles};
use crate::image::{decode_file, encode_jpeg};
use crate::transform::{StageTransform, TransformError};

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("{stage} not started: stage is {status}")]
    NotStartable { stage: Stage, status: StageStatus },

    #[error("{stage} failed: {source}")]
    Transform {
        stage: Stage,
        #[source]
        source: TransformError,
    },

    #[error("{stage} failed to write output: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} could not update the store: {source}")]
    Store {
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::NotStartable { stage, .. }
            | StageError::Transform { stage, .. }
            | StageError::Io { stage, .. }
            | StageError::Store { stage, .. } => *stage,
        }
    }
}

#[derive(Clone)]
pub struct StageExecutor {
    store: Arc<dyn ArtifactStore>,
    transform: Arc<dyn StageTransform>,
    files: ArtifactFiles,
    jpeg_quality: u8,
}

impl StageExecutor {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        transform: Arc<dyn StageTransform>,
        files: ArtifactFiles,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            store,
            transform,
            files,
            jpeg_quality,
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn files(&self) -> &ArtifactFiles {
        &self.files
    }

    /// Claim the stage and run it. If the claim is lost the stored status decides
    /// the result: `done` is reported as success with the existing path.
    #[tracing::instrument(skip(self, source), fields(artifact_id = %id, stage = %stage))]
    pub async fn run(
        &self,
        id: Uuid,
        stage: Stage,
        source: Arc<DynamicImage>,
    ) -> Result<String, StageError> {
        let claimed = self
            .store
            .try_begin_stage(id, stage)
            .await
            .map_err(|source| StageError::Store { stage, source })?;

        if claimed.is_none() {
            let record = self
                .store
                .get(id)
                .await
                .map_err(|source| StageError::Store { stage, source })?;
            return match (record.stage_status(stage), record.stage_path(stage)) {
                (StageStatus::Done, Some(path)) => {
                    tracing::debug!("Stage already done");
                    Ok(path.to_string())
                }
                (status, _) => Err(StageError::NotStartable { stage, status }),
            };
        }

        self.run_claimed(id, stage, source).await
    }

    /// Run a stage the caller has already moved to `processing`.
    #[tracing::instrument(skip(self, source), fields(artifact_id = %id, stage = %stage))]
    pub async fn run_claimed(
        &self,
        id: Uuid,
        stage: Stage,
        source: Arc<DynamicImage>,
    ) -> Result<String, StageError> {
        let output = self.files.output_path(id, stage);

        if let Err(e) = tokio::fs::create_dir_all(self.files.processed_dir()).await {
            return self.fail(id, stage, StageError::Io { stage, source: e }).await;
        }

        let transform = self.transform.clone();
        let quality = self.jpeg_quality;
        let target = output.clone();
        let produced = tokio::task::spawn_blocking(move || {
            render_and_save(transform.as_ref(), stage, &source, quality, target)
        })
        .await
        .unwrap_or_else(|e| {
            Err(StageError::Transform {
                stage,
                source: TransformError::Other(format!("stage task failed: {}", e)),
            })
        });

        if let Err(e) = produced {
            return self.fail(id, stage, e).await;
        }

        let path = output.to_string_lossy().to_string();
        if let Err(source) = self
            .store
            .set_stage(id, stage, StageStatus::Done, Some(&path))
            .await
        {
            if source.is_not_found() {
                tracing::warn!(path = %path, "Artifact deleted during stage run, removing output");
                self.files.remove_all([path.as_str()]).await;
            }
            return Err(StageError::Store { stage, source });
        }
        tracing::info!(path = %path, "Stage done");
        Ok(path)
    }

    /// Decode the record's original and run a claimed stage against it. A decode
    /// failure marks only this stage as `error`.
    pub async fn run_claimed_from_original(
        &self,
        record: &ArtifactRecord,
        stage: Stage,
    ) -> Result<String, StageError> {
        match decode_file(&record.original_path).await {
            Ok(source) => self.run_claimed(record.id, stage, source).await,
            Err(e) => {
                self.fail(record.id, stage, StageError::Transform { stage, source: e })
                    .await
            }
        }
    }

    async fn fail(&self, id: Uuid, stage: Stage, err: StageError) -> Result<String, StageError> {
        tracing::warn!(artifact_id = %id, stage = %stage, error = %err, "Stage failed");
        if let Err(e) = self.store.set_stage(id, stage, StageStatus::Error, None).await {
            tracing::error!(
                artifact_id = %id,
                stage = %stage,
                error = %e,
                "Failed to record stage error"
            );
        }
        Err(err)
    }
}

fn render_and_save(
    transform: &dyn StageTransform,
    stage: Stage,
    source: &DynamicImage,
    quality: u8,
    target: PathBuf,
) -> Result<(), StageError> {
    let rendered = transform
        .apply(stage, source)
        .map_err(|source| StageError::Transform { stage, source })?;
    let bytes = encode_jpeg(&rendered, quality)
        .map_err(|source| StageError::Transform { stage, source })?;
    files::write_atomic_blocking(&target, &bytes).map_err(|source| StageError::Io { stage, source })
}
