//! In-memory backend for testing.
//!
//! Provides [`MemoryBackend`] for unit testing the asset handler without
//! filesystem access.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use cas_key::AssetKey;

use crate::backend::{AssetBackend, BackendError, BackendErrorKind, ErrorStatus};
use crate::content::{AssetContent, AssetMetadata};

const BACKEND: &str = "Memory";

/// In-memory backend for testing.
///
/// Stores assets in a map and counts `find` calls so tests can tell cache
/// hits from backend fetches.
///
/// # Example
///
/// ```ignore
/// use cas_storage::{AssetBackend, MemoryBackend};
///
/// let backend = MemoryBackend::new().with_asset(key.clone(), metadata, "body");
/// let content = backend.find(&key, true).await?;
/// assert_eq!(backend.find_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    assets: RwLock<HashMap<AssetKey, (AssetMetadata, Bytes)>>,
    always_stream: AtomicBool,
    failure: RwLock<Option<BackendErrorKind>>,
    finds: AtomicUsize,
}

impl MemoryBackend {
    /// Create a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_asset(
        self,
        key: AssetKey,
        metadata: AssetMetadata,
        body: impl Into<Bytes>,
    ) -> Self {
        self.insert(key, metadata, body);
        self
    }

    /// Return streamed content even when buffering is requested.
    #[must_use]
    pub fn with_streaming(self) -> Self {
        self.always_stream.store(true, Ordering::SeqCst);
        self
    }

    /// Add or replace an asset.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn insert(&self, key: AssetKey, metadata: AssetMetadata, body: impl Into<Bytes>) {
        self.assets
            .write()
            .unwrap()
            .insert(key, (metadata, body.into()));
    }

    /// Remove an asset.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn remove(&self, key: &AssetKey) {
        self.assets.write().unwrap().remove(key);
    }

    /// Make every subsequent `find` fail with `kind`, or clear with `None`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_with(&self, kind: Option<BackendErrorKind>) {
        *self.failure.write().unwrap() = kind;
    }

    /// Number of `find` calls so far.
    pub fn find_count(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetBackend for MemoryBackend {
    async fn find(
        &self,
        key: &AssetKey,
        prefer_buffered: bool,
    ) -> Result<AssetContent, BackendError> {
        self.finds.fetch_add(1, Ordering::SeqCst);

        if let Some(kind) = *self.failure.read().unwrap() {
            return Err(BackendError::new(kind)
                .with_key(key)
                .with_backend(BACKEND)
                .with_status(ErrorStatus::Temporary));
        }

        let Some((metadata, body)) = self.assets.read().unwrap().get(key).cloned() else {
            return Err(BackendError::not_found(key).with_backend(BACKEND));
        };

        let buffered = prefer_buffered
            && metadata.is_bufferable()
            && !self.always_stream.load(Ordering::SeqCst);
        if buffered {
            Ok(AssetContent::buffered(metadata, body))
        } else {
            Ok(AssetContent::streamed(metadata, Cursor::new(body)))
        }
    }
}

#[cfg(test)]
mod tests {
    use cas_key::{AssetKind, CourseKey};
    use chrono::{TimeZone, Utc};

    use super::*;

    fn key(name: &str) -> AssetKey {
        AssetKey::new(
            CourseKey::new("edX", "DemoX", "2024").unwrap(),
            AssetKind::Asset,
            name,
        )
        .unwrap()
    }

    fn metadata(len: u64) -> AssetMetadata {
        AssetMetadata {
            content_type: "text/plain".to_owned(),
            content_length: len,
            last_modified_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            content_digest: Some("abc".to_owned()),
            locked: false,
        }
    }

    #[tokio::test]
    async fn test_find_returns_buffered_when_preferred() {
        let backend = MemoryBackend::new().with_asset(key("a.txt"), metadata(5), "hello");

        let content = backend.find(&key("a.txt"), true).await.unwrap();
        assert!(content.is_buffered());
        assert_eq!(content.bytes().unwrap().as_ref(), b"hello");
        assert_eq!(backend.find_count(), 1);
    }

    #[tokio::test]
    async fn test_find_streams_when_not_preferred() {
        let backend = MemoryBackend::new().with_asset(key("a.txt"), metadata(5), "hello");

        let content = backend.find(&key("a.txt"), false).await.unwrap();
        assert!(!content.is_buffered());
        let content = content.copy_to_memory().await.unwrap();
        assert_eq!(content.bytes().unwrap().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_with_streaming_overrides_preference() {
        let backend = MemoryBackend::new()
            .with_asset(key("a.txt"), metadata(5), "hello")
            .with_streaming();
        let content = backend.find(&key("a.txt"), true).await.unwrap();
        assert!(!content.is_buffered());
    }

    #[tokio::test]
    async fn test_find_missing() {
        let backend = MemoryBackend::new();
        let err = backend.find(&key("missing"), true).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(backend.find_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_with() {
        let backend = MemoryBackend::new().with_asset(key("a.txt"), metadata(5), "hello");
        backend.fail_with(Some(BackendErrorKind::Unavailable));
        let err = backend.find(&key("a.txt"), true).await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Unavailable);
        assert!(err.is_transient());

        backend.fail_with(None);
        assert!(backend.find(&key("a.txt"), true).await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let backend = MemoryBackend::new();
        backend.insert(key("a.txt"), metadata(1), "x");
        assert!(backend.find(&key("a.txt"), true).await.is_ok());
        backend.remove(&key("a.txt"));
        assert!(backend.find(&key("a.txt"), true).await.is_err());
    }
}
