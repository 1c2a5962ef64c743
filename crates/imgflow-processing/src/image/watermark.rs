use image::imageops::{self, FilterType};
use image::DynamicImage;
use std::path::Path;

use crate::transform::TransformError;

/// Overlay placement and blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatermarkConfig {
    /// Overlay width as a fraction of the source width.
    pub scale: f32,
    /// Multiplier applied to the overlay's alpha channel.
    pub opacity: f32,
    /// Distance from the top-left corner, pixels.
    pub offset: u32,
}

pub struct Watermark;

impl Watermark {
    /// Load the overlay asset. A missing or undecodable asset fails the stage.
    pub fn load(path: &Path) -> Result<DynamicImage, TransformError> {
        let data = std::fs::read(path).map_err(|e| TransformError::OverlayUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        super::decode_bytes(&data).map_err(|e| TransformError::OverlayUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Composite `overlay` onto `img`. The overlay is resized to
    /// `scale * img.width()` wide, keeping its aspect ratio.
    pub fn apply(img: &DynamicImage, overlay: &DynamicImage, config: &WatermarkConfig) -> DynamicImage {
        let (img_width, img_height) = (img.width(), img.height());

        let target_width = ((img_width as f32 * config.scale).round() as u32).clamp(1, img_width.max(1));
        let target_height = if overlay.width() == 0 {
            1
        } else {
            ((overlay.height() as f64 * target_width as f64 / overlay.width() as f64).round() as u32)
                .clamp(1, img_height.max(1))
        };

        let mut mark = overlay
            .resize_exact(target_width, target_height, FilterType::Lanczos3)
            .to_rgba8();

        if config.opacity < 1.0 {
            let opacity = config.opacity.max(0.0);
            for pixel in mark.pixels_mut() {
                pixel[3] = (pixel[3] as f32 * opacity) as u8;
            }
        }

        let mut base = img.to_rgba8();
        imageops::overlay(
            &mut base,
            &mark,
            config.offset as i64,
            config.offset as i64,
        );
        DynamicImage::ImageRgba8(base)
    }
}
