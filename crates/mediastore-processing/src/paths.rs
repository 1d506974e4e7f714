//! Variant path building.

use mediastore_core::FileRecord;
use std::path::Path;

/// Computes the backend-relative path a variant is written to.
///
/// Must be deterministic for a given file and variant, and collision-free
/// across variants of the same file.
pub trait PathBuilder: Send + Sync {
    fn path_for_variant(&self, file: &FileRecord, variant: &str) -> String;
}

/// Default path builder: inserts the variant name between filename stem and
/// extension, next to the original. `media/cat.jpg` + `thumb` becomes
/// `media/cat.thumb.jpg`.
pub struct SuffixPathBuilder;

impl PathBuilder for SuffixPathBuilder {
    fn path_for_variant(&self, file: &FileRecord, variant: &str) -> String {
        let path = Path::new(file.path());
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.filename().to_string());
        let extension = file.extension();

        let name = if extension.is_empty() {
            format!("{}.{}", stem, variant)
        } else {
            format!("{}.{}.{}", stem, variant, extension)
        };

        match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => format!("{}/{}", dir.display(), name),
            None => name,
        }
    }
}
