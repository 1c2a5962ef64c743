//! Imgflow processing
//!
//! Upload validation, the three stage transforms, the stage executor that
//! records each stage's progress, and the pipeline orchestrator that runs all
//! three stages for an artifact and reconciles their outcomes.

pub mod executor;
pub mod files;
pub mod image;
pub mod pipeline;
pub mod transform;
pub mod validator;

pub use executor::{StageError, StageExecutor};
pub use files::ArtifactFiles;
pub use pipeline::{reconcile_aggregate, PipelineError, PipelineOrchestrator, PipelineOutcome};
pub use transform::{ImageStageTransform, StageTransform, TransformError};
pub use validator::{UploadValidator, ValidatedUpload, ValidationError};
