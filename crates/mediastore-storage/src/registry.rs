//! Name-keyed registry of storage backends.
//!
//! File records reference their backend by name; the registry resolves that
//! name to a live [`Storage`] implementation. Backends are registered during
//! bootstrap, after which the registry is shared read-only (typically behind
//! an `Arc`).

use crate::traits::{Storage, StorageError, StorageResult};
use mediastore_core::FileRecord;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct StorageRegistry {
    backends: HashMap<String, Arc<dyn Storage>>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        StorageRegistry::default()
    }

    /// Register a backend under `name`, replacing any prior registration.
    pub fn register(&mut self, name: impl Into<String>, storage: Arc<dyn Storage>) -> &mut Self {
        self.backends.insert(name.into(), storage);
        self
    }

    /// Resolve a backend by name.
    pub fn get(&self, name: &str) -> StorageResult<Arc<dyn Storage>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownBackend(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Build a [`FileRecord`] for an object that already exists on a
    /// registered backend, filling in the size from backend metadata.
    pub async fn file_record(&self, storage: &str, path: &str) -> StorageResult<FileRecord> {
        let backend = self.get(storage)?;

        if !backend.exists(path).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let size = backend.content_length(path).await?;

        Ok(FileRecord::new(storage, path).with_size(size))
    }
}
