//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must
//! implement. The variant processor only ever talks to backends through the
//! stream read/write surface defined here, so local disk and remote object
//! stores are interchangeable.

use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Per-write settings passed alongside a stream.
#[derive(Debug, Clone, Default)]
pub struct WriteConfig {
    /// MIME type recorded with the object, where the backend supports it.
    pub content_type: Option<String>,
}

/// Byte stream handed to and returned from storage backends.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Storage abstraction trait
///
/// All storage backends (local filesystem, S3-compatible object stores) must
/// implement this trait. Paths are backend-relative, must not contain `..`
/// or a leading `/`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Open a read stream for the object at `path`.
    async fn read_stream(&self, path: &str) -> StorageResult<ByteStream>;

    /// Write `reader` to the object at `path`, creating or replacing it.
    /// Returns the number of bytes written.
    async fn write_stream(
        &self,
        path: &str,
        reader: ByteStream,
        config: &WriteConfig,
    ) -> StorageResult<u64>;

    /// Read the whole object at `path` into memory.
    async fn read(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Delete the object at `path`. Deleting a missing object is not an
    /// error.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Check whether an object exists at `path`.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Size in bytes of the object at `path`, if it exists.
    async fn content_length(&self, path: &str) -> StorageResult<u64>;
}
