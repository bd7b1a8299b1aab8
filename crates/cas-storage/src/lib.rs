//! Asset backends for the course asset server.
//!
//! This crate provides the [`AssetBackend`] trait the asset handler loads
//! content through, decoupling request handling from where assets live.
//!
//! # Architecture
//!
//! The crate provides:
//! - [`AssetBackend`] trait with a single async `find()` method
//! - [`AssetContent`]: metadata plus a buffered or streamed body
//! - [`FsBackend`] reading a directory tree with JSON metadata sidecars
//! - [`MemoryBackend`] for testing (behind `mock` feature flag)
//!
//! # Example
//!
//! ```ignore
//! use std::path::PathBuf;
//! use cas_storage::{AssetBackend, FsBackend};
//!
//! let backend = FsBackend::new(PathBuf::from("/srv/assets"));
//! let content = backend.find(&key, true).await?;
//! println!("{} bytes", content.metadata().content_length);
//! ```

mod backend;
mod content;
mod fs;
#[cfg(feature = "mock")]
mod mock;

pub use backend::{AssetBackend, BackendError, BackendErrorKind, ErrorStatus};
pub use content::{AssetBody, AssetContent, AssetMetadata, AssetReader, MAX_CACHEABLE_BYTES};
pub use fs::{FsBackend, META_SUFFIX};
#[cfg(feature = "mock")]
pub use mock::MemoryBackend;
