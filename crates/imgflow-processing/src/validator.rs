use image::{ImageFormat, ImageReader};
use imgflow_core::{AppError, ImageProcessingConfig};
use std::io::Cursor;

/// Reasons an upload is rejected before anything is stored.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Empty file")]
    EmptyFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Unrecognized image format")]
    UnknownFormat,

    #[error("Unsupported image format: {format} (allowed: {allowed:?})")]
    UnsupportedFormat {
        format: String,
        allowed: Vec<String>,
    },

    #[error("Corrupt image: {0}")]
    Corrupt(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Corrupt(_) => AppError::ImageProcessing(err.to_string()),
            _ => AppError::InvalidInput(err.to_string()),
        }
    }
}

/// Result of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl ValidatedUpload {
    /// File extension for the stored original, taken from the sniffed format.
    pub fn extension(&self) -> &'static str {
        format_name(self.format)
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::Gif => "gif",
        other => other.extensions_str().first().copied().unwrap_or("bin"),
    }
}

/// Upload validator: size, sniffed format, and a full decode.
///
/// The format comes from the leading bytes only; the client's filename and
/// Content-Type are ignored.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: usize,
    allowed_formats: Vec<String>,
}

impl UploadValidator {
    pub fn new(max_file_size: usize, allowed_formats: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_formats: allowed_formats
                .into_iter()
                .map(|f| normalize_format(&f))
                .collect(),
        }
    }

    pub fn from_config(config: &ImageProcessingConfig) -> Self {
        Self::new(config.max_file_size_bytes, config.allowed_formats.clone())
    }

    pub fn validate_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    pub fn sniff_format(&self, data: &[u8]) -> Result<ImageFormat, ValidationError> {
        let format = image::guess_format(data).map_err(|_| ValidationError::UnknownFormat)?;
        let name = format_name(format);
        if !self.allowed_formats.iter().any(|f| f == name) {
            return Err(ValidationError::UnsupportedFormat {
                format: name.to_string(),
                allowed: self.allowed_formats.clone(),
            });
        }
        Ok(format)
    }

    /// Run every check. Decoding is CPU-bound; call from a blocking context for
    /// large inputs.
    pub fn validate(&self, data: &[u8]) -> Result<ValidatedUpload, ValidationError> {
        self.validate_size(data.len())?;
        let format = self.sniff_format(data)?;

        let img = ImageReader::with_format(Cursor::new(data), format)
            .decode()
            .map_err(|e| ValidationError::Corrupt(e.to_string()))?;

        Ok(ValidatedUpload {
            format,
            width: img.width(),
            height: img.height(),
        })
    }
}

fn normalize_format(format: &str) -> String {
    match format.trim().to_lowercase().as_str() {
        "jpg" => "jpeg".to_string(),
        other => other.to_string(),
    }
}
