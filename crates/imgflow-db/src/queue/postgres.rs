use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use imgflow_core::QueueConfig;
use sqlx::PgPool;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ArtifactQueue, QueueMessage};
use crate::error::QueueError;

/// Channel for PostgreSQL LISTEN/NOTIFY when an artifact is queued.
pub const QUEUE_NOTIFY_CHANNEL: &str = "imgflow_artifact_queued";

/// Queue backed by the `artifact_queue` table.
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so any number of consumers in the same
/// group can poll concurrently. [`PgArtifactQueue::spawn_background`] starts the
/// LISTEN task (wakes `receive` as soon as something is published) and the
/// stale-claim reaper; without it `receive` falls back to polling.
#[derive(Clone)]
pub struct PgArtifactQueue {
    pool: PgPool,
    config: QueueConfig,
    wakeup: Arc<Notify>,
}

impl PgArtifactQueue {
    pub fn new(pool: PgPool, config: QueueConfig) -> Self {
        Self {
            pool,
            config,
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// Spawn the LISTEN task and the stale-claim reaper. Both stop when `cancel` fires.
    pub fn spawn_background(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);

        let pool = self.pool.clone();
        let wakeup = self.wakeup.clone();
        let listen_cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let listener = tokio::select! {
                    _ = listen_cancel.cancelled() => break,
                    res = sqlx::postgres::PgListener::connect_with(&pool) => res,
                };
                match listener {
                    Ok(mut listener) => {
                        if let Err(e) = listener.listen(QUEUE_NOTIFY_CHANNEL).await {
                            tracing::warn!(error = %e, "LISTEN failed, will retry");
                        } else {
                            loop {
                                tokio::select! {
                                    _ = listen_cancel.cancelled() => return,
                                    msg = listener.recv() => match msg {
                                        Ok(_) => wakeup.notify_waiters(),
                                        Err(e) => {
                                            tracing::warn!(error = %e, "LISTEN connection lost, will reconnect");
                                            break;
                                        }
                                    },
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "PgListener connect failed, will retry");
                    }
                }
                tokio::select! {
                    _ = listen_cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                }
            }
        }));

        if self.config.stale_claim_secs > 0 {
            let queue = self.clone();
            let reap_every = Duration::from_secs(self.config.stale_claim_secs.clamp(1, 60));
            handles.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(reap_every);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            match queue.requeue_stale_claims().await {
                                Ok(0) => {}
                                Ok(n) => tracing::warn!(count = n, "Re-queued stale queue claims"),
                                Err(e) => tracing::error!(error = %e, "Stale claim reaper failed"),
                            }
                        }
                        _ = cancel.cancelled() => break,
                    }
                }
            }));
        }

        handles
    }

    /// Return messages claimed longer than the stale-claim timeout to `queued`.
    #[tracing::instrument(skip(self), fields(db.table = "artifact_queue", db.operation = "update"))]
    pub async fn requeue_stale_claims(&self) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE artifact_queue
            SET status = 'queued', claimed_at = NULL
            WHERE status = 'claimed'
              AND consumer_group = $1
              AND claimed_at < NOW() - make_interval(secs => $2)
            "#,
        )
        .bind(&self.config.consumer_group)
        .bind(self.config.stale_claim_secs as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn claim_next(&self) -> Result<Option<QueueMessage>, QueueError> {
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            UPDATE artifact_queue
            SET status = 'claimed', claimed_at = NOW()
            WHERE id = (
                SELECT id FROM artifact_queue
                WHERE consumer_group = $1 AND status = 'queued'
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, artifact_id
            "#,
        )
        .bind(&self.config.consumer_group)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(delivery_id, payload)| QueueMessage {
            delivery_id,
            payload,
        }))
    }
}

#[async_trait]
impl ArtifactQueue for PgArtifactQueue {
    #[tracing::instrument(skip(self), fields(db.table = "artifact_queue", db.operation = "insert", artifact_id = %artifact_id))]
    async fn publish(&self, artifact_id: Uuid) -> Result<(), QueueError> {
        sqlx::query("INSERT INTO artifact_queue (artifact_id, consumer_group) VALUES ($1, $2)")
            .bind(artifact_id.to_string())
            .bind(&self.config.consumer_group)
            .execute(&self.pool)
            .await?;

        // Wake-up only; a lost notification is covered by polling.
        if let Err(e) = sqlx::query("SELECT pg_notify($1, $2)")
            .bind(QUEUE_NOTIFY_CHANNEL)
            .bind(&self.config.consumer_group)
            .execute(&self.pool)
            .await
        {
            tracing::warn!(error = %e, "pg_notify failed after publish");
        }
        Ok(())
    }

    async fn receive(&self) -> Result<QueueMessage, QueueError> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        loop {
            let notified = self.wakeup.notified();
            if let Some(message) = self.claim_next().await? {
                tracing::debug!(delivery_id = message.delivery_id, "Claimed queue message");
                return Ok(message);
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    #[tracing::instrument(skip(self, message), fields(db.table = "artifact_queue", db.operation = "delete", delivery_id = message.delivery_id))]
    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        sqlx::query("DELETE FROM artifact_queue WHERE id = $1")
            .bind(message.delivery_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
