//! Environment-driven processor configuration.

use serde::Deserialize;

/// Settings for the variant processor, loadable from `MEDIASTORE_`-prefixed
/// environment variables (e.g. `MEDIASTORE_QUALITY=85`,
/// `MEDIASTORE_JPEG_OPTIMIZER=/usr/local/bin/jpegoptim`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// Encoding quality, 1-100.
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// MIME types the processor accepts; anything else passes through
    /// unchanged.
    #[serde(default = "default_mime_types")]
    pub mime_types: Vec<String>,

    #[serde(default)]
    pub jpeg_optimizer: Option<String>,

    #[serde(default)]
    pub png_optimizer: Option<String>,

    #[serde(default)]
    pub gif_optimizer: Option<String>,
}

fn default_quality() -> u8 {
    90
}

fn default_mime_types() -> Vec<String> {
    ["image/gif", "image/jpg", "image/jpeg", "image/png"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            quality: default_quality(),
            mime_types: default_mime_types(),
            jpeg_optimizer: None,
            png_optimizer: None,
            gif_optimizer: None,
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed("MEDIASTORE_").from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProcessorConfig::default();
        assert_eq!(config.quality, 90);
        assert!(config.mime_types.contains(&"image/jpeg".to_string()));
        assert!(config.mime_types.contains(&"image/png".to_string()));
        assert!(config.jpeg_optimizer.is_none());
    }
}
