use async_trait::async_trait;
use imgflow_core::models::ArtifactRow;
use imgflow_core::{ArtifactRecord, ArtifactStatus, Stage, StageStatus};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::{stored_path, ArtifactStore};
use crate::error::StoreError;

const COLUMNS: &str = "id, status, original_path, processed_path, thumbnail_path, \
     watermarked_path, resize_status, thumbnail_status, watermark_status, created_at, updated_at";

/// PostgreSQL-backed artifact store over the `images` table.
#[derive(Clone)]
pub struct ArtifactRepository {
    pool: PgPool,
}

impl ArtifactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM images WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl ArtifactStore for ArtifactRepository {
    #[tracing::instrument(skip(self, record), fields(db.table = "images", db.operation = "insert", db.record_id = %record.id))]
    async fn save(&self, record: &ArtifactRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO images (
                id, status, original_path, processed_path, thumbnail_path, watermarked_path,
                resize_status, thumbnail_status, watermark_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(&record.original_path)
        .bind(&record.processed_path)
        .bind(&record.thumbnail_path)
        .bind(&record.watermarked_path)
        .bind(record.resize_status.as_str())
        .bind(record.thumbnail_status.as_str())
        .bind(record.watermark_status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StoreError::AlreadyExists(record.id);
                }
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<ArtifactRecord, StoreError> {
        let row: Option<ArtifactRow> = sqlx::query_as::<Postgres, ArtifactRow>(&format!(
            "SELECT {COLUMNS} FROM images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ArtifactRecord::from)
            .ok_or(StoreError::NotFound(id))
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "images", db.operation = "update", db.record_id = %record.id))]
    async fn update(&self, record: &ArtifactRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET status = $2,
                original_path = $3,
                processed_path = $4,
                thumbnail_path = $5,
                watermarked_path = $6,
                resize_status = $7,
                thumbnail_status = $8,
                watermark_status = $9,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(&record.original_path)
        .bind(&record.processed_path)
        .bind(&record.thumbnail_path)
        .bind(&record.watermarked_path)
        .bind(record.resize_status.as_str())
        .bind(record.thumbnail_status.as_str())
        .bind(record.watermark_status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(record.id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "select"))]
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<ArtifactRecord>, StoreError> {
        let rows: Vec<ArtifactRow> = sqlx::query_as::<Postgres, ArtifactRow>(&format!(
            "SELECT {COLUMNS} FROM images ORDER BY created_at DESC, id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArtifactRecord::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "update", db.record_id = %id))]
    async fn try_begin_pipeline(&self, id: Uuid) -> Result<bool, StoreError> {
        self.transition_status(id, ArtifactStatus::Pending, ArtifactStatus::Processing)
            .await
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "update", db.record_id = %id, stage = %stage))]
    async fn try_begin_stage(
        &self,
        id: Uuid,
        stage: Stage,
    ) -> Result<Option<ArtifactRecord>, StoreError> {
        let status_col = stage.status_column();
        let path_col = stage.path_column();
        let row: Option<ArtifactRow> = sqlx::query_as::<Postgres, ArtifactRow>(&format!(
            "UPDATE images \
             SET {status_col} = 'processing', {path_col} = NULL, updated_at = NOW() \
             WHERE id = $1 AND {status_col} IN ('pending', 'error') \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into())),
            None if self.exists(id).await? => Ok(None),
            None => Err(StoreError::NotFound(id)),
        }
    }

    #[tracing::instrument(skip(self, path), fields(db.table = "images", db.operation = "update", db.record_id = %id, stage = %stage, status = %status))]
    async fn set_stage(
        &self,
        id: Uuid,
        stage: Stage,
        status: StageStatus,
        path: Option<&str>,
    ) -> Result<ArtifactRecord, StoreError> {
        let status_col = stage.status_column();
        let path_col = stage.path_column();
        let row: Option<ArtifactRow> = sqlx::query_as::<Postgres, ArtifactRow>(&format!(
            "UPDATE images \
             SET {status_col} = $2, {path_col} = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(stored_path(status, path))
        .fetch_optional(&self.pool)
        .await?;

        row.map(ArtifactRecord::from)
            .ok_or(StoreError::NotFound(id))
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "update", db.record_id = %id, status = %status))]
    async fn set_status(&self, id: Uuid, status: ArtifactStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE images SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "update", db.record_id = %id, from = %from, to = %to))]
    async fn transition_status(
        &self,
        id: Uuid,
        from: ArtifactStatus,
        to: ArtifactStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE images SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if self.exists(id).await? {
            Ok(false)
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
