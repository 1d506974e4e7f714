//! Core error types shared by the file record and the variant DSL.

use thiserror::Error;

/// Errors raised while constructing file records.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{0}` has no usable filename component")]
    MissingFilename(String),
}

/// Errors raised while building variant pipelines.
#[derive(Debug, Error)]
pub enum VariantError {
    #[error("variant `{0}` is already registered")]
    DuplicateVariant(String),

    #[error("`{0}` is invalid, provide `h` or `v`")]
    InvalidDirection(String),

    #[error("`{0}` is not a valid position")]
    InvalidPosition(String),
}
