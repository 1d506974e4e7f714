//! Variant URL building.

use mediastore_core::FileRecord;

/// Resolves an externally reachable URL for a processed variant.
///
/// Consulted after the variant's path has been written back to the record,
/// so implementations can rely on `file.variant(name).path`.
pub trait UrlBuilder: Send + Sync {
    fn url_for_variant(&self, file: &FileRecord, variant: &str) -> String;
}

/// Joins the variant path onto a fixed base URL.
pub struct BaseUrlBuilder {
    base_url: String,
}

impl BaseUrlBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        BaseUrlBuilder { base_url }
    }
}

impl UrlBuilder for BaseUrlBuilder {
    fn url_for_variant(&self, file: &FileRecord, variant: &str) -> String {
        let path = file
            .variant(variant)
            .map(|data| data.path.as_str())
            .unwrap_or_default();
        format!("{}/{}", self.base_url, path)
    }
}
