//! On-disk layout of originals and derivatives.
//!
//! ```text
//! {root}/original/{id}.{ext}
//! {root}/processed/{id}_resized.jpg
//! {root}/processed/{id}_thumb.jpg
//! {root}/processed/{id}_watermarked.jpg
//! ```
//!
//! Every write goes to a temp file in the destination directory and is renamed
//! into place, so readers never observe a partial file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use imgflow_core::Stage;
use tokio::fs;
use uuid::Uuid;

const ORIGINAL_DIR: &str = "original";
const PROCESSED_DIR: &str = "processed";

#[derive(Debug, Clone)]
pub struct ArtifactFiles {
    root: PathBuf,
}

impl ArtifactFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn original_dir(&self) -> PathBuf {
        self.root.join(ORIGINAL_DIR)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR)
    }

    pub fn original_path(&self, id: Uuid, extension: &str) -> PathBuf {
        self.original_dir().join(format!("{}.{}", id, extension))
    }

    pub fn output_path(&self, id: Uuid, stage: Stage) -> PathBuf {
        self.processed_dir()
            .join(format!("{}_{}.jpg", id, stage.file_suffix()))
    }

    /// Create both storage directories.
    pub async fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.original_dir()).await?;
        fs::create_dir_all(self.processed_dir()).await
    }

    /// Store upload bytes and return the path written.
    #[tracing::instrument(skip(self, data), fields(artifact_id = %id, size = data.len()))]
    pub async fn write_original(
        &self,
        id: Uuid,
        extension: &str,
        data: &[u8],
    ) -> io::Result<PathBuf> {
        let path = self.original_path(id, extension);
        write_atomic(path.clone(), data.to_vec()).await?;
        tracing::debug!(path = %path.display(), "Stored original");
        Ok(path)
    }

    /// Remove every path, ignoring files that are already gone. Returns the number
    /// of removals that failed for another reason; failures are logged, never raised.
    pub async fn remove_all<'a, I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut failed = 0;
        for path in paths {
            match fs::remove_file(path).await {
                Ok(()) => tracing::debug!(path = %path, "Removed file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path, "File already absent");
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(path = %path, error = %e, "Failed to remove file");
                }
            }
        }
        failed
    }
}

/// Write `data` to `path` via a temp file in the same directory.
pub async fn write_atomic(path: PathBuf, data: Vec<u8>) -> io::Result<()> {
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &data))
        .await
        .map_err(io::Error::other)?
}

pub fn write_atomic_blocking(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
