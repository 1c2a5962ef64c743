//! Imgflow Core Library
//!
//! This crate provides the artifact domain model, the status state machine,
//! error types, and configuration shared across all imgflow components.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, ImageProcessingConfig, QueueConfig, ServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{ArtifactRecord, ArtifactResponse, ArtifactStatus, Stage, StageStatus};
