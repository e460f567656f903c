//! On-disk storage for accepted avatar files.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::UploadConfig;

/// Writes avatars under one directory as `<uuid>.<extension>`.
#[derive(Debug, Clone)]
pub struct AvatarStore {
    dir: PathBuf,
}

impl AvatarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(&config.dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `bytes` and return the generated filename.
    pub async fn store(&self, bytes: &[u8], extension: &str) -> io::Result<String> {
        if !self.dir.exists() {
            tokio::fs::create_dir_all(&self.dir).await?;
            tracing::info!(dir = %self.dir.display(), "Created upload directory");
        }

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.dir.join(&filename), bytes).await?;

        tracing::info!(filename = %filename, size = bytes.len(), "Avatar stored");
        Ok(filename)
    }

    /// Remove a stored avatar. Failures are logged, never returned.
    pub async fn delete(&self, filename: &str) {
        if filename.is_empty() {
            return;
        }
        if filename.contains(|c: char| c == '/' || c == '\\') || filename.starts_with('.') {
            tracing::warn!(filename = %filename, "Refusing to delete avatar outside upload directory");
            return;
        }

        match tokio::fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => tracing::info!(filename = %filename, "Avatar deleted"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(filename = %filename, error = %e, "Failed to delete avatar"),
        }
    }
}
