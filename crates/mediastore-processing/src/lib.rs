//! Mediastore Processing Library
//!
//! Turns the variants declared on a file record into derived files: the
//! [`VariantProcessor`] stages the source locally, runs each variant's
//! operation pipeline through the dispatcher, optionally optimizes the
//! encoded output, and writes the result back to the file's storage backend.
//!
//! Path and URL generation are pluggable through [`PathBuilder`] and
//! [`UrlBuilder`]; binary optimization through [`Optimizer`].

pub mod config;
pub mod error;
pub mod image;
pub mod optimizer;
pub mod paths;
pub mod processor;
pub mod urls;

// Re-export commonly used types
pub use config::ProcessorConfig;
pub use error::{ProcessorError, ProcessorResult};
pub use image::{Operation, Operations};
pub use optimizer::{CommandOptimizer, NoopOptimizer, Optimizer};
pub use paths::{PathBuilder, SuffixPathBuilder};
pub use processor::VariantProcessor;
pub use urls::{BaseUrlBuilder, UrlBuilder};
