//! In-memory cache for fetched tiles.
//!
//! Tiles are cached by image identifier and viewer coordinate. The cache
//! tracks the total size of cached tiles in bytes and evicts
//! least-recently-used entries when the capacity is exceeded. It lives only as
//! long as the surface that owns it and is cleared whenever the surface
//! detaches its content.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;

use crate::pyramid::TileCoordinate;

/// Default cache capacity: 64MB
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for a fetched tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Image the tile belongs to
    pub image_id: Arc<str>,

    /// Tile position (viewer numbering)
    pub coord: TileCoordinate,
}

impl TileCacheKey {
    pub fn new(image_id: impl Into<Arc<str>>, coord: TileCoordinate) -> Self {
        Self {
            image_id: image_id.into(),
            coord,
        }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

struct Entries {
    lru: LruCache<TileCacheKey, Bytes>,
    size: usize,
}

/// Hit/miss counters of a [`TileCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Size-bounded LRU cache of tile bytes.
///
/// Share it across tasks via `Arc`; all operations take a short async lock.
pub struct TileCache {
    entries: Mutex<Entries>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TileCache {
    /// Create a new tile cache with default capacity (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a new tile cache holding at most `max_size` bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new tile cache bounded both in bytes and in entry count.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(Entries {
                lru: LruCache::new(max_entries),
                size: 0,
            }),
            max_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a tile, marking it as recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Bytes> {
        let found = self.entries.lock().await.lru.get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Check for a tile without touching LRU order or counters.
    pub async fn contains(&self, key: &TileCacheKey) -> bool {
        self.entries.lock().await.lru.contains(key)
    }

    /// Store a tile, evicting least-recently-used entries as needed.
    ///
    /// Tiles larger than the whole capacity are not stored.
    pub async fn put(&self, key: TileCacheKey, data: Bytes) {
        let data_size = data.len();
        if data_size > self.max_size {
            return;
        }

        let mut guard = self.entries.lock().await;
        let entries = &mut *guard;

        if let Some(old) = entries.lru.peek(&key) {
            entries.size = entries.size.saturating_sub(old.len());
        }

        // push() reports the entry displaced by the entry-count bound
        if let Some((evicted_key, evicted)) = entries.lru.push(key.clone(), data) {
            if evicted_key != key {
                entries.size = entries.size.saturating_sub(evicted.len());
            }
        }
        entries.size += data_size;

        while entries.size > self.max_size {
            match entries.lru.pop_lru() {
                Some((_, evicted)) => entries.size = entries.size.saturating_sub(evicted.len()),
                None => break,
            }
        }
    }

    /// Drop every entry and reset the counters.
    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.lru.clear();
        entries.size = 0;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of cached tiles.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.lru.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.lru.is_empty()
    }

    /// Total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        self.entries.lock().await.size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCache")
            .field("capacity", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}
