//! The variant processor.
//!
//! Orchestrates one `process` call: stage the source bytes into a local temp
//! file, then for each applicable variant load a fresh image handle, run the
//! declared operations through the dispatcher, encode (optionally through the
//! optimizer), write the result to the file's storage backend at the computed
//! path, and fold the resulting path/URL back into the record.
//!
//! The processor holds no per-call mutable state: the allow-list is threaded
//! through [`VariantProcessor::process_only`] rather than stored on the
//! instance, so one processor can serve concurrent calls. Within one call,
//! variants are processed sequentially over the shared staged file. All temp
//! files are dropped (and thereby deleted) on every exit path.

use crate::config::ProcessorConfig;
use crate::error::{ProcessorError, ProcessorResult};
use crate::image::encode;
use crate::image::operations::Operations;
use crate::optimizer::{CommandOptimizer, NoopOptimizer, Optimizer};
use crate::paths::PathBuilder;
use crate::urls::UrlBuilder;
use bytes::Bytes;
use mediastore_core::{FileRecord, VariantData};
use mediastore_storage::{ByteStream, Storage, StorageRegistry, WriteConfig};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

pub struct VariantProcessor {
    storages: Arc<StorageRegistry>,
    path_builder: Arc<dyn PathBuilder>,
    url_builder: Option<Arc<dyn UrlBuilder>>,
    optimizer: Arc<dyn Optimizer>,
    mime_types: Vec<String>,
    quality: u8,
    staging_dir: Option<PathBuf>,
}

impl VariantProcessor {
    pub fn new(storages: Arc<StorageRegistry>, path_builder: Arc<dyn PathBuilder>) -> Self {
        VariantProcessor {
            storages,
            path_builder,
            url_builder: None,
            optimizer: Arc::new(NoopOptimizer),
            mime_types: ProcessorConfig::default().mime_types,
            quality: ProcessorConfig::default().quality,
            staging_dir: None,
        }
    }

    /// Build a processor from environment-driven settings, using the
    /// subprocess optimizer.
    pub fn from_config(
        config: ProcessorConfig,
        storages: Arc<StorageRegistry>,
        path_builder: Arc<dyn PathBuilder>,
    ) -> ProcessorResult<Self> {
        let optimizer = CommandOptimizer::from_tools(
            config.jpeg_optimizer,
            config.png_optimizer,
            config.gif_optimizer,
        );
        Self::new(storages, path_builder)
            .with_mime_types(config.mime_types)
            .with_optimizer(Arc::new(optimizer))
            .with_quality(config.quality)
    }

    pub fn with_url_builder(mut self, url_builder: Arc<dyn UrlBuilder>) -> Self {
        self.url_builder = Some(url_builder);
        self
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_mime_types(mut self, mime_types: Vec<String>) -> Self {
        self.mime_types = mime_types;
        self
    }

    /// Set the encoding quality, 1-100.
    pub fn with_quality(mut self, quality: u8) -> ProcessorResult<Self> {
        if quality == 0 || quality > 100 {
            return Err(ProcessorError::InvalidQuality(quality));
        }
        self.quality = quality;
        Ok(self)
    }

    /// Stage temp files in `dir` instead of the system temp directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Process every declared variant of `file`.
    ///
    /// Files with no variants, or with a MIME type outside the accepted set,
    /// pass through unchanged.
    pub async fn process(&self, file: FileRecord) -> ProcessorResult<FileRecord> {
        self.run(file, None).await
    }

    /// Process only the named variants; all others are left as declared.
    pub async fn process_only<S: AsRef<str>>(
        &self,
        file: FileRecord,
        variants: &[S],
    ) -> ProcessorResult<FileRecord> {
        let only: Vec<String> = variants.iter().map(|v| v.as_ref().to_string()).collect();
        self.run(file, Some(only)).await
    }

    fn is_applicable(&self, file: &FileRecord) -> bool {
        file.has_variants() && self.mime_types.iter().any(|m| m == file.mime_type())
    }

    fn should_process(&self, name: &str, data: &VariantData, only: Option<&[String]>) -> bool {
        if data.operations.is_empty() {
            return false;
        }
        match only {
            Some(names) => names.iter().any(|n| n == name),
            None => true,
        }
    }

    async fn run(
        &self,
        mut file: FileRecord,
        only: Option<Vec<String>>,
    ) -> ProcessorResult<FileRecord> {
        if !self.is_applicable(&file) {
            tracing::debug!(
                path = %file.path(),
                mime_type = %file.mime_type(),
                "file not applicable, passing through"
            );
            return Ok(file);
        }

        let storage = self.storages.get(file.storage())?;
        let staged = self.stage_source(&file, storage.as_ref()).await?;

        let names: Vec<String> = file.variants().keys().cloned().collect();
        for name in names {
            let Some(data) = file.variant(&name) else {
                continue;
            };
            if !self.should_process(&name, data, only.as_deref()) {
                tracing::debug!(variant = %name, "variant skipped");
                continue;
            }
            let mut data = data.clone();

            let start = std::time::Instant::now();
            let encoded = self.render_variant(&file, &data, staged.path()).await?;
            let path = self.path_builder.path_for_variant(&file, &name);

            if data.optimize {
                self.optimize_and_store(storage.as_ref(), &file, &path, &encoded)
                    .await?;
            } else {
                let config = WriteConfig {
                    content_type: Some(file.mime_type().to_string()),
                };
                let reader: ByteStream = Box::pin(std::io::Cursor::new(encoded));
                storage.write_stream(&path, reader, &config).await?;
            }

            tracing::info!(
                variant = %name,
                path = %path,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "variant processed"
            );

            // Path first, then URL: the URL builder reads the just-written
            // path off the record.
            data.path = path;
            file = file.with_variant(name.as_str(), data.clone());

            if let Some(url_builder) = &self.url_builder {
                data.url = url_builder.url_for_variant(&file, &name);
                file = file.with_variant(name.as_str(), data);
            }
        }

        // `staged` drops here, removing the temp file; the same holds on
        // every error path above.
        Ok(file)
    }

    /// Copy the source bytes into a process-local temp file.
    ///
    /// Uses the record's already-loaded contents when present, otherwise
    /// opens a fresh read stream against the file's storage backend.
    async fn stage_source(
        &self,
        file: &FileRecord,
        storage: &dyn Storage,
    ) -> ProcessorResult<NamedTempFile> {
        let staged = match &self.staging_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|e| ProcessorError::TempFileCreation {
            path: self
                .staging_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            source: e,
        })?;

        let temp_error = |e: std::io::Error| ProcessorError::TempFileCreation {
            path: staged.path().to_path_buf(),
            source: e,
        };

        let mut out = tokio::fs::File::create(staged.path())
            .await
            .map_err(temp_error)?;

        match file.contents() {
            Some(bytes) => {
                out.write_all(bytes).await.map_err(temp_error)?;
            }
            None => {
                let mut reader = storage.read_stream(file.path()).await?;
                tokio::io::copy(&mut reader, &mut out)
                    .await
                    .map_err(temp_error)?;
            }
        }
        out.sync_all().await.map_err(temp_error)?;

        tracing::debug!(path = %staged.path().display(), "source staged");

        Ok(staged)
    }

    /// Load a fresh image handle from the staged file, apply the variant's
    /// operations in order and encode the result.
    async fn render_variant(
        &self,
        file: &FileRecord,
        data: &VariantData,
        staged: &Path,
    ) -> ProcessorResult<Bytes> {
        let operations: Vec<(String, JsonValue)> = data
            .operations
            .iter()
            .map(|(name, args)| (name.clone(), args.clone()))
            .collect();
        let callback = data.callback.clone();
        let staged = staged.to_path_buf();
        let extension = file.extension().to_string();
        let quality = self.quality;

        // Decode, transform and encode are CPU-bound; run off the async pool.
        tokio::task::spawn_blocking(move || {
            // A fresh handle per variant: transformations must not leak
            // between variants.
            let mut image = image::ImageReader::open(&staged)?
                .with_guessed_format()?
                .decode()?;

            for (name, args) in &operations {
                Operations::apply(&mut image, name, args, callback.as_ref())?;
            }

            encode::encode_by_extension(&image, &extension, quality)
        })
        .await?
    }

    /// Run the optimizer between encoding and the backend write.
    ///
    /// The optimizer contract is path-based, so the encoded bytes pass
    /// through a pair of temp files that are removed when this returns,
    /// error or not.
    async fn optimize_and_store(
        &self,
        storage: &dyn Storage,
        file: &FileRecord,
        path: &str,
        encoded: &Bytes,
    ) -> ProcessorResult<()> {
        let suffix = format!(".{}", file.extension());
        let temp_file = || {
            tempfile::Builder::new()
                .suffix(&suffix)
                .tempfile()
                .map_err(|e| ProcessorError::TempFileCreation {
                    path: std::env::temp_dir(),
                    source: e,
                })
        };
        let input = temp_file()?;
        let output = temp_file()?;

        tokio::fs::write(input.path(), encoded)
            .await
            .map_err(|e| ProcessorError::TempFileCreation {
                path: input.path().to_path_buf(),
                source: e,
            })?;

        self.optimizer
            .optimize(input.path(), output.path())
            .await
            .map_err(|e| ProcessorError::Optimizer(e.to_string()))?;

        tracing::debug!(
            input = %input.path().display(),
            output = %output.path().display(),
            "optimizer pass complete"
        );

        let optimized = tokio::fs::File::open(output.path()).await?;
        let config = WriteConfig {
            content_type: Some(file.mime_type().to_string()),
        };
        storage
            .write_stream(path, Box::pin(optimized), &config)
            .await?;

        Ok(())
    }
}
