use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use imgflow_core::{ArtifactRecord, ArtifactStatus, Stage, StageStatus};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{stored_path, ArtifactStore};
use crate::error::StoreError;

/// Process-local artifact store. Each operation holds the map lock for its whole
/// read-modify-write, so the compare-and-set operations are atomic.
#[derive(Clone, Default)]
pub struct InMemoryArtifactStore {
    records: Arc<Mutex<HashMap<Uuid, ArtifactRecord>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn save(&self, record: &ArtifactRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<ArtifactRecord, StoreError> {
        self.records
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, record: &ArtifactRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let slot = records
            .get_mut(&record.id)
            .ok_or(StoreError::NotFound(record.id))?;
        let created_at = slot.created_at;
        *slot = record.clone();
        slot.created_at = created_at;
        slot.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ArtifactRecord>, StoreError> {
        let mut all: Vec<ArtifactRecord> = self.records.lock().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn try_begin_pipeline(&self, id: Uuid) -> Result<bool, StoreError> {
        self.transition_status(id, ArtifactStatus::Pending, ArtifactStatus::Processing)
            .await
    }

    async fn try_begin_stage(
        &self,
        id: Uuid,
        stage: Stage,
    ) -> Result<Option<ArtifactRecord>, StoreError> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !record.stage_status(stage).can_start() {
            return Ok(None);
        }
        record.set_stage(stage, StageStatus::Processing, None);
        Ok(Some(record.clone()))
    }

    async fn set_stage(
        &self,
        id: Uuid,
        stage: Stage,
        status: StageStatus,
        path: Option<&str>,
    ) -> Result<ArtifactRecord, StoreError> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.set_stage(stage, status, stored_path(status, path));
        Ok(record.clone())
    }

    async fn set_status(&self, id: Uuid, status: ArtifactStatus) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: ArtifactStatus,
        to: ArtifactStatus,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status != from {
            return Ok(false);
        }
        record.status = to;
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
