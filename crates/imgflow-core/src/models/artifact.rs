use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::status::{ArtifactStatus, Stage, StageStatus};

/// One uploaded image and the state of its three derivatives.
///
/// Invariant: a stage's path is `Some` exactly when that stage is `done`.
/// [`ArtifactRecord::set_stage`] is the only mutator for stage state and keeps
/// the invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: Uuid,
    pub status: ArtifactStatus,
    pub original_path: String,
    pub processed_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub watermarked_path: Option<String>,
    pub resize_status: StageStatus,
    pub thumbnail_status: StageStatus,
    pub watermark_status: StageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Fresh record for a just-stored upload: everything `pending`, no derivatives.
    pub fn new(id: Uuid, original_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: ArtifactStatus::Pending,
            original_path: original_path.into(),
            processed_path: None,
            thumbnail_path: None,
            watermarked_path: None,
            resize_status: StageStatus::Pending,
            thumbnail_status: StageStatus::Pending,
            watermark_status: StageStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Resize => self.resize_status,
            Stage::Thumbnail => self.thumbnail_status,
            Stage::Watermark => self.watermark_status,
        }
    }

    pub fn stage_path(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::Resize => self.processed_path.as_deref(),
            Stage::Thumbnail => self.thumbnail_path.as_deref(),
            Stage::Watermark => self.watermarked_path.as_deref(),
        }
    }

    /// Set one stage's status. The path is kept only for `done`; any other
    /// status clears it.
    pub fn set_stage(&mut self, stage: Stage, status: StageStatus, path: Option<String>) {
        let path = match status {
            StageStatus::Done => path.filter(|p| !p.is_empty()),
            _ => None,
        };
        let (status_slot, path_slot) = match stage {
            Stage::Resize => (&mut self.resize_status, &mut self.processed_path),
            Stage::Thumbnail => (&mut self.thumbnail_status, &mut self.thumbnail_path),
            Stage::Watermark => (&mut self.watermark_status, &mut self.watermarked_path),
        };
        *status_slot = status;
        *path_slot = path;
        self.updated_at = Utc::now();
    }

    pub fn stage_statuses(&self) -> [StageStatus; 3] {
        Stage::ALL.map(|stage| self.stage_status(stage))
    }

    pub fn failed_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| self.stage_status(*stage) == StageStatus::Error)
            .collect()
    }

    /// Aggregate implied by the current stage statuses, if every stage has finished.
    pub fn reconciled_status(&self) -> Option<ArtifactStatus> {
        ArtifactStatus::from_stages(self.stage_statuses())
    }

    /// Every file location referenced by the record.
    pub fn file_paths(&self) -> Vec<&str> {
        let mut paths = vec![self.original_path.as_str()];
        paths.extend(Stage::ALL.iter().filter_map(|stage| self.stage_path(*stage)));
        paths
    }
}

/// Database row for the `images` table.
///
/// Status columns are plain TEXT; rows written before the stage columns existed
/// (or with values this build doesn't know) decode to `pending`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ArtifactRow {
    pub id: Uuid,
    pub status: Option<String>,
    pub original_path: String,
    pub processed_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub watermarked_path: Option<String>,
    pub resize_status: Option<String>,
    pub thumbnail_status: Option<String>,
    pub watermark_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn non_empty(path: Option<String>) -> Option<String> {
    path.filter(|p| !p.is_empty())
}

impl From<ArtifactRow> for ArtifactRecord {
    fn from(row: ArtifactRow) -> Self {
        let mut record = ArtifactRecord {
            id: row.id,
            status: ArtifactStatus::from_db(row.status.as_deref()),
            original_path: row.original_path,
            processed_path: None,
            thumbnail_path: None,
            watermarked_path: None,
            resize_status: StageStatus::Pending,
            thumbnail_status: StageStatus::Pending,
            watermark_status: StageStatus::Pending,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        let stages = [
            (Stage::Resize, row.resize_status, row.processed_path),
            (Stage::Thumbnail, row.thumbnail_status, row.thumbnail_path),
            (Stage::Watermark, row.watermark_status, row.watermarked_path),
        ];
        for (stage, status, path) in stages {
            record.set_stage(stage, StageStatus::from_db(status.as_deref()), non_empty(path));
        }
        record.updated_at = row.updated_at;
        record
    }
}

/// Client-facing projection of an [`ArtifactRecord`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArtifactResponse {
    pub id: Uuid,
    pub status: ArtifactStatus,
    pub original_path: String,
    pub processed_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub watermarked_path: Option<String>,
    pub resize_status: StageStatus,
    pub thumbnail_status: StageStatus,
    pub watermark_status: StageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ArtifactRecord> for ArtifactResponse {
    fn from(record: ArtifactRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            original_path: record.original_path,
            processed_path: record.processed_path,
            thumbnail_path: record.thumbnail_path,
            watermarked_path: record.watermarked_path,
            resize_status: record.resize_status,
            thumbnail_status: record.thumbnail_status,
            watermark_status: record.watermark_status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
