//! Application state shared by all handlers.

use std::sync::Arc;

use imgflow_core::Config;
use imgflow_db::{ArtifactQueue, ArtifactStore};
use imgflow_processing::{
    ArtifactFiles, ImageStageTransform, PipelineOrchestrator, StageExecutor, UploadValidator,
};
use imgflow_worker::{InFlightRegistry, StageDispatcher};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ArtifactStore>,
    pub queue: Arc<dyn ArtifactQueue>,
    pub files: ArtifactFiles,
    pub validator: UploadValidator,
    pub orchestrator: PipelineOrchestrator,
    pub dispatcher: StageDispatcher,
}

impl AppState {
    /// Wire the processing stack over the given store and queue.
    pub fn new(
        config: Config,
        store: Arc<dyn ArtifactStore>,
        queue: Arc<dyn ArtifactQueue>,
        registry: InFlightRegistry,
    ) -> Self {
        let processing = config.processing();
        let files = ArtifactFiles::new(processing.storage_path.clone());
        let executor = StageExecutor::new(
            store.clone(),
            Arc::new(ImageStageTransform::new(processing)),
            files.clone(),
            processing.jpeg_quality,
        );

        Self {
            validator: UploadValidator::from_config(processing),
            orchestrator: PipelineOrchestrator::new(executor.clone()),
            dispatcher: StageDispatcher::new(executor, registry),
            files,
            store,
            queue,
            config,
        }
    }

    pub fn registry(&self) -> &InFlightRegistry {
        self.dispatcher.registry()
    }
}
