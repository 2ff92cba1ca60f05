//! LRU cache of projection indices.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::config::ResampleConfig;
use crate::index::ProjIndex;
use crate::types::CacheStats;
use radar_common::{LatLonGrid, RadarResult};

/// Cache key: (source grid fingerprint, destination grid fingerprint,
/// config hash).
pub type IndexKey = (u64, u64, u64);

/// Thread-safe LRU cache of built projection indices.
///
/// Indices are shared as `Arc<ProjIndex>`, so an evicted index stays alive
/// for the callers still using it.
pub struct IndexCache {
    cache: Mutex<LruCache<IndexKey, Arc<ProjIndex>>>,
    /// Keys currently being built
    building: Mutex<HashMap<IndexKey, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl IndexCache {
    /// Create a cache holding at most `capacity` indices (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            building: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cache key for a grid pair and configuration.
    pub fn key(src: &LatLonGrid, dest: &LatLonGrid, config: &ResampleConfig) -> IndexKey {
        (src.fingerprint(), dest.fingerprint(), config.cache_key())
    }

    /// Return the cached index for this grid pair and configuration, or
    /// build and cache it.
    ///
    /// Each key is built once: concurrent callers missing on the same key
    /// wait for the first build instead of repeating it. The cache lock is
    /// not held while building, so other keys are served meanwhile.
    pub fn get_or_build(
        &self,
        src: &LatLonGrid,
        dest: &LatLonGrid,
        config: &ResampleConfig,
    ) -> RadarResult<Arc<ProjIndex>> {
        let key = Self::key(src, dest, config);
        if let Some(index) = self.lookup(&key) {
            return Ok(index);
        }

        let slot = Arc::clone(self.lock_building().entry(key).or_default());
        let _building = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(index) = self.lookup(&key) {
            return Ok(index);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let result = ProjIndex::build(src, dest, config).map(Arc::new);
        if let Ok(index) = &result {
            self.insert(key, Arc::clone(index));
        }
        self.lock_building().remove(&key);
        result
    }

    fn lookup(&self, key: &IndexKey) -> Option<Arc<ProjIndex>> {
        let found = self.lock().get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Look up an index without building it.
    pub fn get(&self, key: &IndexKey) -> Option<Arc<ProjIndex>> {
        let found = self.lock().get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Insert an index, evicting the least recently used one if full.
    pub fn insert(&self, key: IndexKey, index: Arc<ProjIndex>) {
        if let Some((evicted_key, _)) = self.lock().push(key, index) {
            if evicted_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(?evicted_key, "Evicted projection index");
            }
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let cache = self.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: cache.len(),
            memory_bytes: cache.iter().map(|(_, idx)| idx.memory_bytes() as u64).sum(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<IndexKey, Arc<ProjIndex>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_building(&self) -> MutexGuard<'_, HashMap<IndexKey, Arc<Mutex<()>>>> {
        self.building.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new(16)
    }
}
