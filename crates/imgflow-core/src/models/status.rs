//! Status enums and the aggregate-status rule.
//!
//! Stage statuses only move forward (`pending -> processing -> done | error`);
//! the only way back is a re-trigger, which is allowed from `pending` or `error`.
//! The aggregate status is derived from the three stage statuses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// One of the three independent derivative-generation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resize,
    Thumbnail,
    Watermark,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Resize, Stage::Thumbnail, Stage::Watermark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resize => "resize",
            Stage::Thumbnail => "thumbnail",
            Stage::Watermark => "watermark",
        }
    }

    /// Suffix of the derived file name: `{id}_{suffix}.jpg`.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Stage::Resize => "resized",
            Stage::Thumbnail => "thumb",
            Stage::Watermark => "watermarked",
        }
    }

    /// Column holding this stage's status.
    pub fn status_column(&self) -> &'static str {
        match self {
            Stage::Resize => "resize_status",
            Stage::Thumbnail => "thumbnail_status",
            Stage::Watermark => "watermark_status",
        }
    }

    /// Column holding this stage's output path.
    pub fn path_column(&self) -> &'static str {
        match self {
            Stage::Resize => "processed_path",
            Stage::Thumbnail => "thumbnail_path",
            Stage::Watermark => "watermarked_path",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resize" => Ok(Stage::Resize),
            "thumbnail" => Ok(Stage::Thumbnail),
            "watermark" => Ok(Stage::Watermark),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

/// Per-stage state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    #[default]
    Pending,
    Processing,
    Done,
    Error,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Processing => "processing",
            StageStatus::Done => "done",
            StageStatus::Error => "error",
        }
    }

    /// Lenient decoding used on reads: anything unknown (older rows, NULL) is `pending`.
    pub fn from_db(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(StageStatus::Pending)
    }

    /// A stage may be (re)started only from `pending` or `error`.
    pub fn can_start(&self) -> bool {
        matches!(self, StageStatus::Pending | StageStatus::Error)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StageStatus::Done | StageStatus::Error)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StageStatus::Pending),
            "processing" => Ok(StageStatus::Processing),
            "done" => Ok(StageStatus::Done),
            "error" => Ok(StageStatus::Error),
            other => Err(format!("unknown stage status '{}'", other)),
        }
    }
}

/// Artifact-level summary derived from the three stage statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    #[default]
    Pending,
    Processing,
    Partial,
    Done,
    Error,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Pending => "pending",
            ArtifactStatus::Processing => "processing",
            ArtifactStatus::Partial => "partial",
            ArtifactStatus::Done => "done",
            ArtifactStatus::Error => "error",
        }
    }

    pub fn from_db(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(ArtifactStatus::Pending)
    }

    /// Aggregate outcome of a pipeline run given how many of the three stages failed.
    pub fn from_failures(failed: usize) -> Self {
        match failed {
            0 => ArtifactStatus::Done,
            n if n >= Stage::ALL.len() => ArtifactStatus::Error,
            _ => ArtifactStatus::Partial,
        }
    }

    /// Aggregate implied by the stage statuses, or `None` while any stage is unfinished.
    pub fn from_stages(stages: [StageStatus; 3]) -> Option<Self> {
        if !stages.iter().all(StageStatus::is_terminal) {
            return None;
        }
        let failed = stages.iter().filter(|s| **s == StageStatus::Error).count();
        Some(Self::from_failures(failed))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ArtifactStatus::Partial | ArtifactStatus::Done | ArtifactStatus::Error
        )
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ArtifactStatus::Pending),
            "processing" => Ok(ArtifactStatus::Processing),
            "partial" => Ok(ArtifactStatus::Partial),
            "done" => Ok(ArtifactStatus::Done),
            "error" => Ok(ArtifactStatus::Error),
            other => Err(format!("unknown artifact status '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_for_every_stage_outcome_combination() {
        for mask in 0u8..8 {
            let outcomes: Vec<bool> = (0..3).map(|bit| mask & (1 << bit) == 0).collect();
            let failed = outcomes.iter().filter(|ok| !**ok).count();
            let expected = match failed {
                0 => ArtifactStatus::Done,
                3 => ArtifactStatus::Error,
                _ => ArtifactStatus::Partial,
            };
            assert_eq!(ArtifactStatus::from_failures(failed), expected, "mask {mask:03b}");

            let stages = [0, 1, 2].map(|i| {
                if outcomes[i] {
                    StageStatus::Done
                } else {
                    StageStatus::Error
                }
            });
            assert_eq!(ArtifactStatus::from_stages(stages), Some(expected));
        }
    }

    #[test]
    fn unfinished_stages_have_no_aggregate() {
        let stages = [StageStatus::Done, StageStatus::Processing, StageStatus::Error];
        assert_eq!(ArtifactStatus::from_stages(stages), None);
        let stages = [StageStatus::Pending, StageStatus::Done, StageStatus::Done];
        assert_eq!(ArtifactStatus::from_stages(stages), None);
    }

    #[test]
    fn unknown_db_values_default_to_pending() {
        assert_eq!(StageStatus::from_db(None), StageStatus::Pending);
        assert_eq!(StageStatus::from_db(Some("")), StageStatus::Pending);
        assert_eq!(StageStatus::from_db(Some("queued")), StageStatus::Pending);
        assert_eq!(StageStatus::from_db(Some("done")), StageStatus::Done);
        assert_eq!(ArtifactStatus::from_db(Some("partial")), ArtifactStatus::Partial);
        assert_eq!(ArtifactStatus::from_db(None), ArtifactStatus::Pending);
    }

    #[test]
    fn restart_only_from_pending_or_error() {
        assert!(StageStatus::Pending.can_start());
        assert!(StageStatus::Error.can_start());
        assert!(!StageStatus::Processing.can_start());
        assert!(!StageStatus::Done.can_start());
    }

    #[test]
    fn stage_parses_from_path_segment() {
        assert_eq!("resize".parse::<Stage>().unwrap(), Stage::Resize);
        assert_eq!("Thumbnail".parse::<Stage>().unwrap(), Stage::Thumbnail);
        assert_eq!("watermark".parse::<Stage>().unwrap(), Stage::Watermark);
        assert!("blur".parse::<Stage>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ArtifactStatus::Partial).unwrap(),
            serde_json::json!("partial")
        );
        assert_eq!(
            serde_json::to_value(StageStatus::Processing).unwrap(),
            serde_json::json!("processing")
        );
    }
}
