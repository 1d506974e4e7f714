use crate::traits::{ByteStream, Storage, StorageError, StorageResult, WriteConfig};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance rooted at `base_path`, creating the
    /// directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert a backend-relative path to a filesystem path with security
    /// validation.
    ///
    /// Rejects paths that could escape the base storage directory through
    /// traversal sequences or absolute components.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        if path.contains("..") || path.starts_with('/') {
            return Err(StorageError::InvalidPath(
                "Storage path contains invalid characters".to_string(),
            ));
        }

        let resolved = self.base_path.join(path);

        if let Ok(canonical) = resolved.canonicalize() {
            let base_canonical = self.base_path.canonicalize().map_err(|e| {
                StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
            })?;
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidPath(
                    "Storage path resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(resolved)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read_stream(&self, path: &str) -> StorageResult<ByteStream> {
        let resolved = self.resolve(path)?;

        if !fs::try_exists(&resolved).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let file = fs::File::open(&resolved).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to open file {}: {}", resolved.display(), e))
        })?;

        tracing::debug!(path = %resolved.display(), "Local storage read stream opened");

        Ok(Box::pin(file))
    }

    async fn write_stream(
        &self,
        path: &str,
        mut reader: ByteStream,
        _config: &WriteConfig,
    ) -> StorageResult<u64> {
        let resolved = self.resolve(path)?;

        self.ensure_parent_dir(&resolved).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&resolved).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create file {}: {}",
                resolved.display(),
                e
            ))
        })?;

        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to write stream to file {}: {}",
                resolved.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", resolved.display(), e))
        })?;

        tracing::info!(
            path = %resolved.display(),
            key = %path,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(bytes_copied)
    }

    async fn read(&self, path: &str) -> StorageResult<Vec<u8>> {
        let resolved = self.resolve(path)?;

        if !fs::try_exists(&resolved).await.unwrap_or(false) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let data = fs::read(&resolved).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to read file {}: {}", resolved.display(), e))
        })?;

        tracing::debug!(
            path = %resolved.display(),
            key = %path,
            size_bytes = data.len(),
            "Local storage read successful"
        );

        Ok(data)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let resolved = self.resolve(path)?;

        if !fs::try_exists(&resolved).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&resolved).await.map_err(|e| {
            StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                resolved.display(),
                e
            ))
        })?;

        tracing::info!(path = %resolved.display(), key = %path, "Local storage delete successful");

        Ok(())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let resolved = self.resolve(path)?;
        Ok(fs::try_exists(&resolved).await.unwrap_or(false))
    }

    async fn content_length(&self, path: &str) -> StorageResult<u64> {
        let resolved = self.resolve(path)?;
        let meta = fs::metadata(&resolved)
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;
        Ok(meta.len())
    }
}
