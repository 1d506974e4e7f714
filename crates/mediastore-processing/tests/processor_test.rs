//! End-to-end processor tests against a local storage backend.

use async_trait::async_trait;
use bytes::Bytes;
use image::{GenericImageView, Rgba, RgbaImage};
use mediastore_core::{FileRecord, ImageCallback, ImageVariantCollection, OrderedMap, VariantData};
use mediastore_processing::{
    BaseUrlBuilder, Optimizer, ProcessorError, SuffixPathBuilder, VariantProcessor,
};
use mediastore_storage::{LocalStorage, Storage, StorageError, StorageRegistry, WriteConfig};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(width, height, Rgba([200, 60, 60, 255]));
    // A non-uniform corner so flips and crops change pixel content.
    for x in 0..width.min(8) {
        for y in 0..height.min(8) {
            img.put_pixel(x, y, Rgba([0, 0, 200, 255]));
        }
    }
    let image = image::DynamicImage::ImageRgba8(img);
    let mut buffer = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}

async fn setup() -> (TempDir, Arc<StorageRegistry>, Arc<LocalStorage>) {
    let root = TempDir::new().unwrap();
    let storage = Arc::new(LocalStorage::new(root.path()).await.unwrap());
    let mut registry = StorageRegistry::new();
    registry.register("local", storage.clone());
    (root, Arc::new(registry), storage)
}

async fn put_source(storage: &LocalStorage, path: &str, data: Vec<u8>) {
    storage
        .write_stream(path, Box::pin(std::io::Cursor::new(data)), &WriteConfig::default())
        .await
        .unwrap();
}

fn processor(registry: Arc<StorageRegistry>) -> VariantProcessor {
    VariantProcessor::new(registry, Arc::new(SuffixPathBuilder))
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

async fn decoded_variant(storage: &LocalStorage, path: &str) -> image::DynamicImage {
    let bytes = storage.read(path).await.unwrap();
    image::load_from_memory(&bytes).unwrap()
}

struct RecordingOptimizer {
    calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl RecordingOptimizer {
    fn new() -> Self {
        RecordingOptimizer {
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Optimizer for RecordingOptimizer {
    async fn optimize(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((input.to_path_buf(), output.to_path_buf()));
        tokio::fs::copy(input, output).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_file_without_variants_passes_through() {
    let (root, registry, _storage) = setup().await;

    let file = FileRecord::new("local", "media/plain.png");
    let before = file.clone();

    let result = processor(registry).process(file).await.unwrap();

    assert_eq!(result, before);
    assert!(files_under(root.path()).is_empty());
}

#[tokio::test]
async fn test_unaccepted_mime_type_passes_through() {
    let (root, registry, _storage) = setup().await;

    let mut collection = ImageVariantCollection::create();
    collection.add_new("thumb").unwrap().scale(100, 100, false);

    let file = FileRecord::new("local", "media/report.pdf").with_variants(collection.to_variants());
    let before = file.clone();

    let result = processor(registry).process(file).await.unwrap();

    assert_eq!(result, before);
    assert!(files_under(root.path()).is_empty());
}

#[tokio::test]
async fn test_process_writes_variants_and_updates_record() {
    let (_root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(400, 200)).await;

    let mut collection = ImageVariantCollection::create();
    collection.add_new("thumb").unwrap().scale(100, 100, false);
    collection.add_new("crop").unwrap().crop(40, 20);
    collection
        .add_new("mirror")
        .unwrap()
        .flip_horizontal()
        .resize(50, 50, false);

    let file = FileRecord::new("local", "media/sample.png").with_variants(collection.to_variants());

    let result = processor(registry).process(file).await.unwrap();

    let thumb = result.variant("thumb").unwrap();
    assert_eq!(thumb.path, "media/sample.thumb.png");
    assert!(thumb.url.is_empty());
    assert_eq!(result.variant("crop").unwrap().path, "media/sample.crop.png");
    assert_eq!(
        result.variant("mirror").unwrap().path,
        "media/sample.mirror.png"
    );

    // Scale preserves aspect ratio; resize and crop are exact.
    let thumb_img = decoded_variant(&storage, "media/sample.thumb.png").await;
    assert_eq!(thumb_img.dimensions(), (100, 50));
    let crop_img = decoded_variant(&storage, "media/sample.crop.png").await;
    assert_eq!(crop_img.dimensions(), (40, 20));
    let mirror_img = decoded_variant(&storage, "media/sample.mirror.png").await;
    assert_eq!(mirror_img.dimensions(), (50, 50));
}

#[tokio::test]
async fn test_url_builder_resolves_written_path() {
    let (_root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(64, 64)).await;

    let mut collection = ImageVariantCollection::create();
    collection.add_new("thumb").unwrap().scale(32, 32, false);

    let file = FileRecord::new("local", "media/sample.png").with_variants(collection.to_variants());

    let result = processor(registry)
        .with_url_builder(Arc::new(BaseUrlBuilder::new("http://cdn.example.com/")))
        .process(file)
        .await
        .unwrap();

    let thumb = result.variant("thumb").unwrap();
    assert_eq!(thumb.path, "media/sample.thumb.png");
    assert_eq!(thumb.url, "http://cdn.example.com/media/sample.thumb.png");
}

#[tokio::test]
async fn test_reprocessing_is_deterministic() {
    let (_root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(300, 300)).await;

    let mut collection = ImageVariantCollection::create();
    collection.add_new("resized").unwrap().resize(300, 300, false);

    let file = FileRecord::new("local", "media/sample.png").with_variants(collection.to_variants());
    let processor = processor(registry);

    let first = processor.process(file.clone()).await.unwrap();
    let first_bytes = storage.read("media/sample.resized.png").await.unwrap();

    let second = processor.process(file).await.unwrap();
    let second_bytes = storage.read("media/sample.resized.png").await.unwrap();

    assert_eq!(
        first.variant("resized").unwrap().path,
        second.variant("resized").unwrap().path
    );
    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn test_allow_list_limits_processing_to_named_variants() {
    let (root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(120, 120)).await;

    let mut collection = ImageVariantCollection::create();
    collection.add_new("thumb").unwrap().scale(60, 60, false);
    collection.add_new("crop").unwrap().crop(30, 30);
    collection.add_new("flip").unwrap().flip_vertical();

    let file = FileRecord::new("local", "media/sample.png").with_variants(collection.to_variants());

    let result = processor(registry)
        .process_only(file, &["thumb"])
        .await
        .unwrap();

    assert_eq!(result.variant("thumb").unwrap().path, "media/sample.thumb.png");
    assert!(result.variant("crop").unwrap().path.is_empty());
    assert!(result.variant("flip").unwrap().path.is_empty());

    // Only the source and the thumb variant exist on the backend.
    assert_eq!(files_under(root.path()).len(), 2);
}

#[tokio::test]
async fn test_variant_with_no_operations_is_skipped() {
    let (root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(80, 80)).await;

    let mut variants: OrderedMap<VariantData> = OrderedMap::new();
    variants.insert("declared", VariantData::default());

    let mut collection = ImageVariantCollection::create();
    collection.add_new("thumb").unwrap().scale(40, 40, false);
    variants.insert("thumb", collection.get("thumb").unwrap().to_data());

    let file = FileRecord::new("local", "media/sample.png").with_variants(variants);

    let result = processor(registry).process(file).await.unwrap();

    assert!(result.variant("declared").unwrap().path.is_empty());
    assert_eq!(result.variant("thumb").unwrap().path, "media/sample.thumb.png");
    assert_eq!(files_under(root.path()).len(), 2);
}

#[tokio::test]
async fn test_optimizer_invoked_once_and_temp_files_removed() {
    let (_root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(100, 100)).await;

    let mut collection = ImageVariantCollection::create();
    collection
        .add_new("thumb")
        .unwrap()
        .scale(50, 50, false)
        .optimize();

    let file = FileRecord::new("local", "media/sample.png").with_variants(collection.to_variants());

    let optimizer = Arc::new(RecordingOptimizer::new());
    let result = processor(registry)
        .with_optimizer(optimizer.clone())
        .process(file)
        .await
        .unwrap();

    assert_eq!(result.variant("thumb").unwrap().path, "media/sample.thumb.png");
    assert!(storage.exists("media/sample.thumb.png").await.unwrap());

    let calls = optimizer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (input, output) = &calls[0];
    assert_ne!(input, output);
    // Scoped cleanup: both optimizer temp files are gone after the call.
    assert!(!input.exists());
    assert!(!output.exists());
}

#[tokio::test]
async fn test_staging_failure_fails_call_with_no_backend_writes() {
    let (root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(50, 50)).await;

    let mut collection = ImageVariantCollection::create();
    collection.add_new("thumb").unwrap().scale(25, 25, false);

    let file = FileRecord::new("local", "media/sample.png").with_variants(collection.to_variants());

    let missing_dir = root.path().join("does-not-exist");
    let result = processor(registry)
        .with_staging_dir(&missing_dir)
        .process(file)
        .await;

    assert!(matches!(
        result,
        Err(ProcessorError::TempFileCreation { .. })
    ));
    // Only the source file exists; nothing was written.
    assert_eq!(files_under(root.path()).len(), 1);
}

#[tokio::test]
async fn test_callback_operation_runs_against_loaded_contents() {
    let (_root, registry, storage) = setup().await;

    // Contents loaded up front: staging must not touch the backend.
    let file = FileRecord::from_bytes(
        Bytes::from(sample_png(90, 60)),
        "inline.png",
        "local",
    );

    let mut collection = ImageVariantCollection::create();
    collection
        .add_new("custom")
        .unwrap()
        .callback(ImageCallback::new(|image, _args| {
            *image = image.resize_exact(10, 10, image::imageops::FilterType::Nearest);
            Ok(())
        }));

    let file = file.with_variants(collection.to_variants());

    let result = processor(registry).process(file).await.unwrap();

    assert_eq!(result.variant("custom").unwrap().path, "inline.custom.png");
    let custom = decoded_variant(&storage, "inline.custom.png").await;
    assert_eq!(custom.dimensions(), (10, 10));
}

#[tokio::test]
async fn test_missing_argument_aborts_the_call() {
    let (root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(40, 40)).await;

    // Hand-built descriptor with an invalid pipeline; the builder would have
    // rejected this, but persisted metadata can carry anything.
    let mut broken = VariantData::default();
    broken.operations.insert("crop", json!({ "width": 10 }));

    let file = FileRecord::new("local", "media/sample.png").with_variant("broken", broken);

    let result = processor(registry).process(file).await;

    assert!(matches!(
        result,
        Err(ProcessorError::MissingArgument { operation, argument })
            if operation == "crop" && argument == "height"
    ));
    assert_eq!(files_under(root.path()).len(), 1);
}

#[tokio::test]
async fn test_unknown_operation_aborts_the_call() {
    let (_root, registry, storage) = setup().await;
    put_source(&storage, "media/sample.png", sample_png(40, 40)).await;

    let mut warped = VariantData::default();
    warped.operations.insert("warp", json!({ "factor": 2 }));

    let file = FileRecord::new("local", "media/sample.png").with_variant("warped", warped);

    let result = processor(registry).process(file).await;

    assert!(matches!(
        result,
        Err(ProcessorError::UnsupportedOperation(name)) if name == "warp"
    ));
}

#[tokio::test]
async fn test_unknown_storage_backend_fails() {
    let (_root, registry, _storage) = setup().await;

    let mut collection = ImageVariantCollection::create();
    collection.add_new("thumb").unwrap().scale(10, 10, false);

    let file = FileRecord::new("cdn", "media/sample.png").with_variants(collection.to_variants());

    let result = processor(registry).process(file).await;

    assert!(matches!(
        result,
        Err(ProcessorError::Storage(StorageError::UnknownBackend(name))) if name == "cdn"
    ));
}
