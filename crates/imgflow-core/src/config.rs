//! Configuration module
//!
//! Settings are read from the environment (a `.env` file is honoured) and
//! validated once at startup.

use std::env;
use std::path::PathBuf;

const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: usize = 10;
const RESIZE_WIDTH: u32 = 800;
const THUMBNAIL_SIZE: u32 = 100;
const WATERMARK_SCALE: f32 = 0.2;
const WATERMARK_OPACITY: f32 = 0.7;
const WATERMARK_OFFSET: u32 = 10;
const JPEG_QUALITY: u8 = 90;
const QUEUE_CONSUMER_GROUP: &str = "image-processor-group";
const QUEUE_POLL_INTERVAL_MS: u64 = 1000;
const QUEUE_STALE_CLAIM_SECS: u64 = 600;
const SHUTDOWN_GRACE_SECS: u64 = 10;

/// Parameters of the three processing stages and of upload validation.
#[derive(Clone, Debug)]
pub struct ImageProcessingConfig {
    pub storage_path: PathBuf,
    pub watermark_path: PathBuf,
    pub max_file_size_bytes: usize,
    /// Sniffed formats accepted at upload, lowercase (`jpeg`, `png`, `gif`).
    pub allowed_formats: Vec<String>,
    pub resize_width: u32,
    pub thumbnail_size: u32,
    pub watermark_scale: f32,
    pub watermark_opacity: f32,
    pub watermark_offset: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageProcessingConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./storage"),
            watermark_path: PathBuf::from("./watermark.png"),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            allowed_formats: vec!["jpeg".to_string(), "png".to_string(), "gif".to_string()],
            resize_width: RESIZE_WIDTH,
            thumbnail_size: THUMBNAIL_SIZE,
            watermark_scale: WATERMARK_SCALE,
            watermark_opacity: WATERMARK_OPACITY,
            watermark_offset: WATERMARK_OFFSET,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

impl ImageProcessingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }
        if self.allowed_formats.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_IMAGE_FORMATS must list at least one format"
            ));
        }
        if self.resize_width == 0 || self.thumbnail_size == 0 {
            return Err(anyhow::anyhow!(
                "RESIZE_WIDTH and THUMBNAIL_SIZE must be greater than 0"
            ));
        }
        if !(self.watermark_scale > 0.0 && self.watermark_scale <= 1.0) {
            return Err(anyhow::anyhow!("WATERMARK_SCALE must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.watermark_opacity) {
            return Err(anyhow::anyhow!("WATERMARK_OPACITY must be in [0, 1]"));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG_QUALITY must be in 1..=100"));
        }
        Ok(())
    }
}

/// Durable queue consumer settings.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub consumer_group: String,
    pub poll_interval_ms: u64,
    /// Claimed messages older than this are handed out again. 0 = never.
    pub stale_claim_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            consumer_group: QUEUE_CONSUMER_GROUP.to_string(),
            poll_interval_ms: QUEUE_POLL_INTERVAL_MS,
            stale_claim_secs: QUEUE_STALE_CLAIM_SECS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub log_format: String,
    pub shutdown_grace_secs: u64,
    pub processing: ImageProcessingConfig,
    pub queue: QueueConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    fn inner(&self) -> &ServiceConfig {
        &self.0
    }

    pub fn new(inner: ServiceConfig) -> Self {
        Config(Box::new(inner))
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().server_port
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().cors_origins
    }

    pub fn log_format(&self) -> &str {
        &self.inner().log_format
    }

    pub fn shutdown_grace_secs(&self) -> u64 {
        self.inner().shutdown_grace_secs
    }

    pub fn processing(&self) -> &ImageProcessingConfig {
        &self.inner().processing
    }

    pub fn queue(&self) -> &QueueConfig {
        &self.inner().queue
    }

    pub fn storage_path(&self) -> &std::path::Path {
        &self.inner().processing.storage_path
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.inner().processing.max_file_size_bytes
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_file_size_mb: usize = env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB);

        let processing = ImageProcessingConfig {
            storage_path: env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./storage")),
            watermark_path: env::var("WATERMARK_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./watermark.png")),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            allowed_formats: split_list(
                &env::var("ALLOWED_IMAGE_FORMATS").unwrap_or_else(|_| "jpeg,png,gif".to_string()),
            ),
            resize_width: env_or("RESIZE_WIDTH", RESIZE_WIDTH),
            thumbnail_size: env_or("THUMBNAIL_SIZE", THUMBNAIL_SIZE),
            watermark_scale: env_or("WATERMARK_SCALE", WATERMARK_SCALE),
            watermark_opacity: env_or("WATERMARK_OPACITY", WATERMARK_OPACITY),
            watermark_offset: env_or("WATERMARK_OFFSET", WATERMARK_OFFSET),
            jpeg_quality: env_or("JPEG_QUALITY", JPEG_QUALITY),
        };

        let queue = QueueConfig {
            consumer_group: env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| QUEUE_CONSUMER_GROUP.to_string()),
            poll_interval_ms: env_or("QUEUE_POLL_INTERVAL_MS", QUEUE_POLL_INTERVAL_MS),
            stale_claim_secs: env_or("QUEUE_STALE_CLAIM_SECS", QUEUE_STALE_CLAIM_SECS),
        };

        let config = ServiceConfig {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            environment,
            cors_origins,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "compact".to_string())
                .to_lowercase(),
            shutdown_grace_secs: env_or("SHUTDOWN_GRACE_SECS", SHUTDOWN_GRACE_SECS),
            processing,
            queue,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if is_production_env(&self.environment) && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.log_format != "compact" && self.log_format != "json" {
            return Err(anyhow::anyhow!("LOG_FORMAT must be 'compact' or 'json'"));
        }

        if self.queue.consumer_group.trim().is_empty() {
            return Err(anyhow::anyhow!("QUEUE_CONSUMER_GROUP must not be empty"));
        }

        self.processing.validate()
    }
}
