//! Domain models

pub mod artifact;
pub mod status;

pub use artifact::{ArtifactRecord, ArtifactResponse, ArtifactRow};
pub use status::{ArtifactStatus, Stage, StageStatus};
