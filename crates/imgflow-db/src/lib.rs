//! Persistence for imgflow
//!
//! Two concerns live here:
//! - [`ArtifactStore`]: the metadata store for artifact records, with a PostgreSQL
//!   repository and an in-memory implementation.
//! - [`ArtifactQueue`]: the durable queue feeding the pipeline consumer, with a
//!   PostgreSQL table-backed queue and an in-memory channel.
//!
//! Schema changes live in the workspace `migrations/` directory and are embedded
//! into [`MIGRATOR`].

pub mod error;
pub mod queue;
pub mod store;

pub use error::{QueueError, StoreError};
pub use queue::{ArtifactQueue, InMemoryQueue, PgArtifactQueue, QueueMessage};
pub use store::{ArtifactRepository, ArtifactStore, InMemoryArtifactStore};

/// Embedded migrations. Every migration is additive and safe to re-apply.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Apply all pending migrations.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
