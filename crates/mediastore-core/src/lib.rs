//! Mediastore Core Library
//!
//! Core domain model for storage-backend-agnostic file management: the
//! [`FileRecord`] value object, the variant pipeline DSL
//! ([`ImageVariantCollection`] / [`ImageVariant`]), and the shared error
//! types. Storage backends live in `mediastore-storage`; the processor that
//! turns declared variants into derived files lives in
//! `mediastore-processing`.

pub mod error;
pub mod file;
pub mod map;
pub mod variant;

// Re-export commonly used types
pub use error::{FileError, VariantError};
pub use file::{mime_type_for_extension, FileRecord, ModelRef};
pub use map::OrderedMap;
pub use variant::{
    FlipDirection, ImageCallback, ImageVariant, ImageVariantCollection, Position, VariantData,
};
