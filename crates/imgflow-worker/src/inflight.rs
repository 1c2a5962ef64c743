//! Handles of on-demand stage runs, keyed by (artifact, stage).
//!
//! Finished handles are dropped lazily whenever the registry is consulted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use imgflow_core::Stage;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

type Key = (Uuid, Stage);

#[derive(Clone, Default)]
pub struct InFlightRegistry {
    tasks: Arc<Mutex<HashMap<Key, JoinHandle<()>>>>,
}

/// What happened to tracked work at shutdown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed: usize,
    /// Runs still going when the grace period ran out. Their stage stays
    /// `processing` in the store.
    pub abandoned: Vec<(Uuid, Stage)>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, JoinHandle<()>>> {
        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tasks.retain(|_, handle| !handle.is_finished());
        tasks
    }

    pub fn is_running(&self, id: Uuid, stage: Stage) -> bool {
        self.lock().contains_key(&(id, stage))
    }

    pub fn track(&self, id: Uuid, stage: Stage, handle: JoinHandle<()>) {
        if let Some(previous) = self.lock().insert((id, stage), handle) {
            tracing::warn!(artifact_id = %id, stage = %stage, "Replaced a running stage handle");
            drop(previous);
        }
    }

    pub fn running(&self) -> Vec<(Uuid, Stage)> {
        self.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait up to `grace` for every tracked run, then abort the rest.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let drained: Vec<(Key, JoinHandle<()>)> = self.lock().drain().collect();
        if drained.is_empty() {
            return ShutdownReport::default();
        }
        tracing::info!(count = drained.len(), grace_secs = grace.as_secs(), "Waiting for in-flight stage runs");

        let deadline = Instant::now() + grace;
        let mut report = ShutdownReport::default();
        for ((id, stage), mut handle) in drained {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => report.completed += 1,
                Ok(Err(e)) => {
                    tracing::error!(artifact_id = %id, stage = %stage, error = %e, "Stage task failed");
                    report.completed += 1;
                }
                Err(_) => {
                    handle.abort();
                    tracing::warn!(
                        artifact_id = %id,
                        stage = %stage,
                        "Abandoned stage run at shutdown; stage stays processing"
                    );
                    report.abandoned.push((id, stage));
                }
            }
        }
        report
    }
}
