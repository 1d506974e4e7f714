//! Processor error types.
//!
//! Everything that can go wrong between "record handed to the processor" and
//! "variants written" surfaces here. Nothing is retried and nothing is
//! swallowed: a failed operation aborts the whole `process` call, leaving any
//! variants already written in place (callers re-run per variant via the
//! allow-list).

use mediastore_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("missing `{argument}` argument for `{operation}`")]
    MissingArgument {
        operation: String,
        argument: String,
    },

    #[error("invalid `{argument}` argument for `{operation}`: {message}")]
    InvalidArgument {
        operation: String,
        argument: String,
        message: String,
    },

    #[error("unsupported image operation `{0}`")]
    UnsupportedOperation(String),

    #[error("could not create temporary file `{path}`: {source}")]
    TempFileCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("quality has to be between 1 and 100, {0} was provided")]
    InvalidQuality(u8),

    #[error("no encoder for extension `{0}`")]
    UnsupportedFormat(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("callback operation failed: {0}")]
    Callback(String),

    #[error("optimizer failed: {0}")]
    Optimizer(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for processing operations
pub type ProcessorResult<T> = Result<T, ProcessorError>;
