use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use super::{ArtifactQueue, QueueMessage};
use crate::error::QueueError;

/// Single-process queue over an unbounded channel. Clones share the same channel,
/// so every message goes to exactly one receiver.
#[derive(Clone)]
pub struct InMemoryQueue {
    sender: mpsc::UnboundedSender<QueueMessage>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<QueueMessage>>>,
    next_id: Arc<AtomicI64>,
    unacked: Arc<StdMutex<HashSet<i64>>>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            next_id: Arc::new(AtomicI64::new(1)),
            unacked: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    /// Enqueue a raw payload.
    pub fn publish_raw(&self, payload: impl Into<String>) -> Result<(), QueueError> {
        let message = QueueMessage {
            delivery_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            payload: payload.into(),
        };
        self.sender.send(message).map_err(|_| QueueError::Closed)
    }

    /// Messages received but not yet acknowledged.
    pub fn unacked(&self) -> usize {
        self.unacked_set().len()
    }

    fn unacked_set(&self) -> std::sync::MutexGuard<'_, HashSet<i64>> {
        self.unacked.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ArtifactQueue for InMemoryQueue {
    async fn publish(&self, artifact_id: Uuid) -> Result<(), QueueError> {
        self.publish_raw(artifact_id.to_string())
    }

    async fn receive(&self) -> Result<QueueMessage, QueueError> {
        let mut receiver = self.receiver.lock().await;
        let message = receiver.recv().await.ok_or(QueueError::Closed)?;
        self.unacked_set().insert(message.delivery_id);
        Ok(message)
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        self.unacked_set().remove(&message.delivery_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_published_ids_in_order() {
        let queue = InMemoryQueue::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        queue.publish(first).await.unwrap();
        queue.publish(second).await.unwrap();

        let m1 = queue.receive().await.unwrap();
        let m2 = queue.receive().await.unwrap();
        assert_eq!(m1.artifact_id().unwrap(), first);
        assert_eq!(m2.artifact_id().unwrap(), second);
        assert_eq!(queue.unacked(), 2);

        queue.ack(&m1).await.unwrap();
        queue.ack(&m2).await.unwrap();
        assert_eq!(queue.unacked(), 0);
    }

    #[tokio::test]
    async fn receive_waits_for_publish() {
        let queue = InMemoryQueue::new();
        let consumer = queue.clone();
        let handle = tokio::spawn(async move { consumer.receive().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        let id = Uuid::new_v4();
        queue.publish(id).await.unwrap();
        let message = handle.await.unwrap().unwrap();
        assert_eq!(message.artifact_id().unwrap(), id);
    }

    #[tokio::test]
    async fn garbage_payload_fails_to_parse() {
        let queue = InMemoryQueue::new();
        queue.publish_raw("not-a-uuid").unwrap();
        let message = queue.receive().await.unwrap();
        assert!(message.artifact_id().is_err());
    }
}
