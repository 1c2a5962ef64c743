//! Pixel-level operations for the three stages, plus decode/encode helpers.

pub mod resize;
pub mod thumbnail;
pub mod watermark;

pub use resize::resize_to_width;
pub use thumbnail::square_thumbnail;
pub use watermark::{Watermark, WatermarkConfig};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::transform::TransformError;

/// Decode bytes, sniffing the format from content.
pub fn decode_bytes(data: &[u8]) -> Result<DynamicImage, TransformError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| TransformError::Decode(e.to_string()))
}

/// Read and decode a file on a blocking thread. The result is shared read-only
/// between stages.
pub async fn decode_file(path: impl AsRef<Path>) -> Result<Arc<DynamicImage>, TransformError> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || {
        let data = std::fs::read(&path).map_err(|e| {
            TransformError::Decode(format!("cannot read {}: {}", path.display(), e))
        })?;
        decode_bytes(&data).map(Arc::new)
    })
    .await
    .map_err(|e| TransformError::Decode(format!("decode task failed: {}", e)))?
}

/// Encode as baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, TransformError> {
    let rgb = img.to_rgb8();
    let mut buffer = Vec::with_capacity((rgb.width() * rgb.height()) as usize);
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(buffer)
}
