//! Queue consumer: one message at a time, each run to completion, then acked.
//!
//! Messages are acked whatever the pipeline outcome. A failed artifact keeps
//! its failure on the record and is retried through the per-stage trigger, not
//! by re-delivery.

use std::sync::Arc;
use std::time::Duration;

use imgflow_db::{ArtifactQueue, QueueError, QueueMessage};
use imgflow_processing::{PipelineError, PipelineOutcome};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::PipelineHandler;

const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct QueueConsumer {
    queue: Arc<dyn ArtifactQueue>,
    handler: Arc<dyn PipelineHandler>,
}

impl QueueConsumer {
    pub fn new(queue: Arc<dyn ArtifactQueue>, handler: Arc<dyn PipelineHandler>) -> Self {
        Self { queue, handler }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Consume until `cancel` fires or the queue closes. A message already being
    /// handled is finished before the loop checks for cancellation again.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("Queue consumer started");

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.queue.receive() => received,
            };

            match received {
                Ok(message) => self.process(message).await,
                Err(QueueError::Closed) => {
                    tracing::warn!("Queue closed, consumer exiting");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to receive from queue, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!("Queue consumer stopped");
    }

    async fn process(&self, message: QueueMessage) {
        match message.artifact_id() {
            Ok(id) => match self.handler.handle(id).await {
                Ok(PipelineOutcome::Completed) => {
                    tracing::info!(artifact_id = %id, "Artifact processed");
                }
                Ok(PipelineOutcome::Skipped { status }) => {
                    tracing::debug!(artifact_id = %id, status = %status, "Artifact already handled");
                }
                Ok(PipelineOutcome::HandedOff { unfinished }) => {
                    tracing::info!(
                        artifact_id = %id,
                        unfinished = unfinished.len(),
                        "Artifact processed, on-demand runs still hold stages"
                    );
                }
                Err(PipelineError::StagesFailed { failed, status }) => {
                    tracing::warn!(
                        artifact_id = %id,
                        status = %status,
                        failed = failed.len(),
                        "Artifact processed with failed stages"
                    );
                }
                Err(e) => {
                    tracing::error!(artifact_id = %id, error = %e, "Artifact processing failed");
                }
            },
            Err(e) => {
                tracing::warn!(
                    delivery_id = message.delivery_id,
                    payload = %message.payload,
                    error = %e,
                    "Dropping message with invalid artifact id"
                );
            }
        }

        if let Err(e) = self.queue.ack(&message).await {
            tracing::error!(delivery_id = message.delivery_id, error = %e, "Failed to ack message");
        }
    }
}
