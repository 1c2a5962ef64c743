//! Stores, queue and background workers.

use std::sync::Arc;
use std::time::Duration;

use imgflow_core::Config;
use imgflow_db::{ArtifactQueue, ArtifactRepository, ArtifactStore, PgArtifactQueue};
use imgflow_worker::{InFlightRegistry, QueueConsumer};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

/// Background work owned by the process: the queue consumer, the queue's
/// listener and reaper, and on-demand stage runs.
pub struct BackgroundWorkers {
    cancel: CancellationToken,
    consumer: JoinHandle<()>,
    queue_tasks: Vec<JoinHandle<()>>,
    registry: InFlightRegistry,
    grace: Duration,
}

impl BackgroundWorkers {
    /// Start consuming `state.queue`. `queue_tasks` are extra tasks stopped by the
    /// same token.
    pub fn start(
        state: &AppState,
        cancel: CancellationToken,
        queue_tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        let consumer = QueueConsumer::new(state.queue.clone(), Arc::new(state.orchestrator.clone()))
            .spawn(cancel.clone());

        Self {
            cancel,
            consumer,
            queue_tasks,
            registry: state.registry().clone(),
            grace: Duration::from_secs(state.config.shutdown_grace_secs()),
        }
    }

    /// Stop consuming, then give on-demand stage runs the grace period.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        // The consumer finishes the message it is handling before it exits.
        if let Err(e) = self.consumer.await {
            tracing::error!(error = %e, "Queue consumer task failed");
        }
        for task in self.queue_tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Queue background task failed");
            }
        }

        let report = self.registry.shutdown(self.grace).await;
        if report.abandoned.is_empty() {
            tracing::info!(completed = report.completed, "Background work stopped");
        } else {
            tracing::warn!(
                completed = report.completed,
                abandoned = report.abandoned.len(),
                "Background work stopped with abandoned stage runs"
            );
        }
    }
}

/// PostgreSQL-backed state and workers.
pub fn initialize_services(config: &Config, pool: PgPool) -> (Arc<AppState>, BackgroundWorkers) {
    let store: Arc<dyn ArtifactStore> = Arc::new(ArtifactRepository::new(pool.clone()));
    let queue = PgArtifactQueue::new(pool, config.queue().clone());

    let cancel = CancellationToken::new();
    let queue_tasks = queue.spawn_background(cancel.clone());
    let queue: Arc<dyn ArtifactQueue> = Arc::new(queue);

    let state = AppState::new(config.clone(), store, queue, InFlightRegistry::new());
    let workers = BackgroundWorkers::start(&state, cancel, queue_tasks);
    tracing::info!(
        consumer_group = %config.queue().consumer_group,
        "Queue consumer started"
    );

    (Arc::new(state), workers)
}
