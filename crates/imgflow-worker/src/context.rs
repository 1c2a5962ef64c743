//! Pipeline handler trait
//!
//! The consumer calls `handle` for every claimed message. The real
//! implementation is the pipeline orchestrator; tests substitute their own.

use async_trait::async_trait;
use imgflow_processing::{PipelineError, PipelineOrchestrator, PipelineOutcome};
use uuid::Uuid;

#[async_trait]
pub trait PipelineHandler: Send + Sync {
    async fn handle(&self, artifact_id: Uuid) -> Result<PipelineOutcome, PipelineError>;
}

#[async_trait]
impl PipelineHandler for PipelineOrchestrator {
    async fn handle(&self, artifact_id: Uuid) -> Result<PipelineOutcome, PipelineError> {
        self.run(artifact_id).await
    }
}
