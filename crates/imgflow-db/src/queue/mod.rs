//! Durable queue of artifacts awaiting the full pipeline.
//!
//! One message is published per upload. Consumers of the same group share the
//! stream: each message is handed to exactly one of them. Delivery is
//! at-least-once; a message claimed by a consumer that dies before acking is
//! handed out again after the stale-claim timeout.

mod memory;
mod postgres;

pub use memory::InMemoryQueue;
pub use postgres::{PgArtifactQueue, QUEUE_NOTIFY_CHANNEL};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::QueueError;

/// A claimed message. Pass it back to [`ArtifactQueue::ack`] once handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub delivery_id: i64,
    /// Artifact identifier as published.
    pub payload: String,
}

impl QueueMessage {
    pub fn artifact_id(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(self.payload.trim())
    }
}

#[async_trait]
pub trait ArtifactQueue: Send + Sync {
    async fn publish(&self, artifact_id: Uuid) -> Result<(), QueueError>;

    /// Wait until a message is available and claim it. Dropping the future never
    /// loses a message; at worst it is re-delivered after the stale-claim timeout.
    async fn receive(&self) -> Result<QueueMessage, QueueError>;

    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError>;
}
