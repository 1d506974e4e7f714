//! Mediastore Storage Library
//!
//! Storage abstraction and backend implementations. The [`Storage`] trait
//! exposes stream-oriented read/write semantics; [`LocalStorage`] and
//! [`S3Storage`] implement it for the local filesystem and S3-compatible
//! object stores. Backends are looked up by name through the
//! [`StorageRegistry`].
//!
//! Paths are backend-relative and must not contain `..` or a leading `/`.

#[cfg(feature = "storage-local")]
pub mod local;
pub mod registry;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use registry::StorageRegistry;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult, WriteConfig};
