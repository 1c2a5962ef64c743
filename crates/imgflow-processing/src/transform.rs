//! Stage transforms.
//!
//! [`StageTransform`] is the seam between the executor and pixel work: the
//! executor only knows "given a decoded bitmap, produce a new one or fail".

use image::DynamicImage;
use imgflow_core::{ImageProcessingConfig, Stage};
use std::path::PathBuf;

use crate::image::{resize_to_width, square_thumbnail, Watermark, WatermarkConfig};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("watermark overlay unavailable at {path}: {reason}")]
    OverlayUnavailable { path: String, reason: String },

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("{0}")]
    Other(String),
}

/// Produces one stage's output bitmap. Implementations are CPU-bound and run on
/// blocking threads.
pub trait StageTransform: Send + Sync {
    fn apply(&self, stage: Stage, source: &DynamicImage) -> Result<DynamicImage, TransformError>;
}

/// The production transforms.
#[derive(Debug, Clone)]
pub struct ImageStageTransform {
    resize_width: u32,
    thumbnail_size: u32,
    watermark_path: PathBuf,
    watermark: WatermarkConfig,
}

impl ImageStageTransform {
    pub fn new(config: &ImageProcessingConfig) -> Self {
        Self {
            resize_width: config.resize_width,
            thumbnail_size: config.thumbnail_size,
            watermark_path: config.watermark_path.clone(),
            watermark: WatermarkConfig {
                scale: config.watermark_scale,
                opacity: config.watermark_opacity,
                offset: config.watermark_offset,
            },
        }
    }
}

impl StageTransform for ImageStageTransform {
    fn apply(&self, stage: Stage, source: &DynamicImage) -> Result<DynamicImage, TransformError> {
        match stage {
            Stage::Resize => Ok(resize_to_width(source, self.resize_width)),
            Stage::Thumbnail => Ok(square_thumbnail(source, self.thumbnail_size)),
            Stage::Watermark => {
                // Read per run so replacing the asset takes effect without a restart.
                let overlay = Watermark::load(&self.watermark_path)?;
                Ok(Watermark::apply(source, &overlay, &self.watermark))
            }
        }
    }
}
