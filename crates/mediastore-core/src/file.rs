//! The file record value object.
//!
//! A [`FileRecord`] describes one stored object: where it lives (backend name
//! plus backend-relative path), what it is (filename, extension, MIME type,
//! size), and what has been derived from it (the variants mapping). Records
//! are values: every `with_` transition consumes the record and returns the
//! updated state, so holders of a prior clone never observe the change.
//!
//! The identifier, backend name and path form the addressing triple for the
//! physical object; no transition on derived state (metadata, variants)
//! touches them.

use crate::error::FileError;
use crate::map::OrderedMap;
use crate::variant::VariantData;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

/// Polymorphic owner reference, e.g. `("User", "42")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    id: Uuid,
    storage: String,
    path: String,
    filename: String,
    extension: String,
    mime_type: String,
    size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<ModelRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    collection: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, JsonValue>,
    #[serde(default)]
    variants: OrderedMap<VariantData>,
    /// Already-loaded source bytes, if the caller has them at hand. Transient:
    /// not part of the persisted record and dropped on serialization.
    #[serde(skip)]
    contents: Option<Bytes>,
}

impl FileRecord {
    /// Create a record addressing `path` on the named storage backend.
    ///
    /// Filename, extension and MIME type are derived from the path; the size
    /// is unknown (zero) until set by a factory or the caller.
    pub fn new(storage: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let filename = Path::new(&path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&filename);
        let mime_type = mime_type_for_extension(&extension).to_string();

        FileRecord {
            id: Uuid::new_v4(),
            storage: storage.into(),
            path,
            filename,
            extension,
            mime_type,
            size: 0,
            model: None,
            collection: None,
            metadata: BTreeMap::new(),
            variants: OrderedMap::new(),
            contents: None,
        }
    }

    /// Build a record from a file on the local disk, loading its bytes into
    /// the transient contents handle so processing does not have to fetch the
    /// original from the backend.
    pub async fn from_disk(
        local_path: impl AsRef<Path>,
        storage: impl Into<String>,
    ) -> Result<Self, FileError> {
        let local_path = local_path.as_ref();
        let filename = local_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| FileError::MissingFilename(local_path.display().to_string()))?;

        let data = tokio::fs::read(local_path).await.map_err(|e| FileError::Io {
            path: local_path.display().to_string(),
            source: e,
        })?;

        Ok(Self::from_bytes(Bytes::from(data), filename, storage))
    }

    /// Build a record from in-memory bytes.
    pub fn from_bytes(
        data: impl Into<Bytes>,
        filename: impl Into<String>,
        storage: impl Into<String>,
    ) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(storage, filename.into())
            .with_size(size)
            .with_contents(data)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn storage(&self) -> &str {
        &self.storage
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn model(&self) -> Option<&ModelRef> {
        self.model.as_ref()
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, JsonValue> {
        &self.metadata
    }

    pub fn variants(&self) -> &OrderedMap<VariantData> {
        &self.variants
    }

    pub fn variant(&self, name: &str) -> Option<&VariantData> {
        self.variants.get(name)
    }

    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    /// The transient already-loaded source bytes, if present.
    pub fn contents(&self) -> Option<&Bytes> {
        self.contents.as_ref()
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Rename the file. Extension and MIME type are re-derived from the new
    /// name; the backend path is left alone.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self.extension = extension_of(&self.filename);
        self.mime_type = mime_type_for_extension(&self.extension).to_string();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn belongs_to_model(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.model = Some(ModelRef {
            name: name.into(),
            id: id.into(),
        });
        self
    }

    pub fn add_to_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Replace the whole metadata mapping.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, JsonValue>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set a single metadata key.
    pub fn with_metadata_key(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn without_metadata_key(mut self, key: &str) -> Self {
        self.metadata.remove(key);
        self
    }

    /// Replace the whole variants mapping.
    pub fn with_variants(mut self, variants: OrderedMap<VariantData>) -> Self {
        self.variants = variants;
        self
    }

    /// Insert or replace a single variant descriptor.
    pub fn with_variant(mut self, name: impl Into<String>, data: VariantData) -> Self {
        self.variants.insert(name, data);
        self
    }

    pub fn with_contents(mut self, contents: impl Into<Bytes>) -> Self {
        self.contents = Some(contents.into());
        self
    }

    pub fn without_contents(mut self) -> Self {
        self.contents = None;
        self
    }
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Map a file extension to a MIME type for the formats this system handles.
pub fn mime_type_for_extension(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
