//! Bounded LRU implementation.
//!
//! [`LruAssetCache`] keeps at most `capacity` entries in a [`LruCache`]
//! behind a mutex. Every operation holds the lock for a single splice of
//! the recency list and never across I/O. Cached bodies are reference
//! counted, so a hit clones a pointer rather than the asset.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use cas_key::AssetKey;
use cas_storage::{AssetContent, MAX_CACHEABLE_BYTES};
use lru::LruCache;
use parking_lot::Mutex;

use crate::{AssetCache, CacheStats};

/// Default entry count.
pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

/// A cached asset.
struct CacheEntry {
    content: AssetContent,
    inserted_at: Instant,
}

/// Bounded LRU [`AssetCache`].
///
/// Worst-case footprint is `capacity * MAX_CACHEABLE_BYTES`.
pub struct LruAssetCache {
    entries: Mutex<LruCache<AssetKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    admissions: AtomicU64,
    evictions: AtomicU64,
}

impl LruAssetCache {
    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            admissions: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn remove(&self, key: &AssetKey) {
        if let Some(entry) = self.entries.lock().pop(key) {
            tracing::debug!(
                key = %key,
                age_ms = entry.inserted_at.elapsed().as_millis(),
                "Invalidated cached asset"
            );
        }
    }
}

impl Default for LruAssetCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AssetCache for LruAssetCache {
    fn get(&self, key: &AssetKey) -> Option<AssetContent> {
        let content = self
            .entries
            .lock()
            .get(key)
            .and_then(|entry| entry.content.try_clone());
        let counter = if content.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        content
    }

    fn put(&self, key: &AssetKey, content: &AssetContent) -> bool {
        let Some(bytes) = content.bytes() else {
            return false;
        };
        let metadata = content.metadata();
        if metadata.content_length >= MAX_CACHEABLE_BYTES
            || bytes.len() as u64 != metadata.content_length
        {
            return false;
        }
        let Some(content) = content.try_clone() else {
            return false;
        };

        let entry = CacheEntry {
            content,
            inserted_at: Instant::now(),
        };
        let displaced = self.entries.lock().push(key.clone(), entry);
        self.admissions.fetch_add(1, Ordering::Relaxed);

        // `push` also returns the old value when the key was already present.
        if let Some((old_key, _)) = displaced
            && old_key != *key
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(evicted = %old_key, "Evicted least recently used asset");
        }
        tracing::debug!(key = %key, len = metadata.content_length, "Cached asset");
        true
    }

    fn invalidate(&self, key: &AssetKey) {
        self.remove(key);
        let runless = key.without_run();
        if runless != *key {
            self.remove(&runless);
        }
    }

    fn stats(&self) -> CacheStats {
        let (entries, capacity) = {
            let guard = self.entries.lock();
            (guard.len(), guard.cap().get())
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            admissions: self.admissions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries,
            capacity,
        }
    }
}
