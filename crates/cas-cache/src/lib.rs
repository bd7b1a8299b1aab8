//! In-process cache of small course assets.
//!
//! This crate provides the [`AssetCache`] trait that decouples the asset
//! handler from the caching strategy. The cache only ever holds buffered
//! content, so every hit can be cloned and sliced without touching the
//! backend again.
//!
//! # Implementations
//!
//! - [`NullAssetCache`]: No-op implementation (always misses)
//! - [`LruAssetCache`]: Bounded LRU keyed by [`AssetKey`]
//!
//! # Example
//!
//! ```
//! use cas_cache::{AssetCache, NullAssetCache};
//!
//! let cache = NullAssetCache;
//! assert_eq!(cache.stats().entries, 0);
//! ```

mod memory;
pub use memory::{DEFAULT_CAPACITY, LruAssetCache};

use cas_key::AssetKey;
use cas_storage::AssetContent;
use serde::Serialize;

/// Point-in-time counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned content.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries accepted by `put`.
    pub admissions: u64,
    /// Entries dropped to make room for newer ones.
    pub evictions: u64,
    /// Current entry count.
    pub entries: usize,
    /// Maximum entry count.
    pub capacity: usize,
}

/// Shared cache of buffered assets.
///
/// All operations are short, non-blocking critical sections; none of them
/// performs I/O.
pub trait AssetCache: Send + Sync {
    /// Look up `key`, marking it most recently used.
    ///
    /// Returns a buffered copy of the cached content.
    fn get(&self, key: &AssetKey) -> Option<AssetContent>;

    /// Offer `content` for caching.
    ///
    /// Streamed content, content at or above
    /// [`cas_storage::MAX_CACHEABLE_BYTES`] and content whose buffer length
    /// disagrees with its metadata are rejected. Returns whether the entry
    /// was admitted. An existing entry for the same key is replaced.
    fn put(&self, key: &AssetKey, content: &AssetContent) -> bool;

    /// Drop `key` and its runless variant. Missing entries are ignored.
    fn invalidate(&self, key: &AssetKey);

    /// Snapshot the counters.
    fn stats(&self) -> CacheStats;
}

/// No-op [`AssetCache`] that never stores anything.
///
/// Use when caching is disabled.
pub struct NullAssetCache;

impl AssetCache for NullAssetCache {
    fn get(&self, _key: &AssetKey) -> Option<AssetContent> {
        None
    }

    fn put(&self, _key: &AssetKey, _content: &AssetContent) -> bool {
        false
    }

    fn invalidate(&self, _key: &AssetKey) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
