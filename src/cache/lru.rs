//! LRU (Least Recently Used) cache for decoded data blocks.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// A unique identifier for a cached block.
///
/// Combines the file identity (derived from the reader's name) with the
/// block's position in the data-block index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Identity of the file the block belongs to.
    pub file_id: u64,
    /// Position of the block in the file's data-block index.
    pub block: u64,
}

impl CacheKey {
    /// Create a new cache key.
    pub fn new(file_id: u64, block: u64) -> Self {
        Self { file_id, block }
    }
}

/// Counters for cache performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of insertions.
    pub insertions: u64,
    /// Number of evictions.
    pub evictions: u64,
}

impl CacheStats {
    /// Cache hit rate in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Thread-safe LRU cache holding decoded blocks under a byte budget.
///
/// Values are `Bytes`, so a `get` returns a cheap independent view over the
/// shared immutable storage. Share the cache across readers with
/// `Arc<BlockCache>`.
#[derive(Debug)]
pub struct BlockCache {
    /// Maximum cache capacity in bytes. Zero disables the cache.
    capacity: usize,
    /// Current cached bytes.
    current_size: AtomicU64,
    /// Cache entries stored by key.
    entries: RwLock<HashMap<CacheKey, Bytes>>,
    /// LRU queue, most recently used at the back.
    lru_queue: RwLock<VecDeque<CacheKey>>,
    /// Cache statistics.
    stats: RwLock<CacheStats>,
}

impl BlockCache {
    /// Create a cache bounded to `capacity` bytes. A capacity of zero
    /// disables caching entirely.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            current_size: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
            lru_queue: RwLock::new(VecDeque::new()),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Get a block, marking it most recently used on a hit.
    ///
    /// The returned `Bytes` is an independent view: consuming it does not
    /// affect the cached copy.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        if self.capacity == 0 {
            return None;
        }

        let entries = self.entries.read();
        if let Some(value) = entries.get(key) {
            let result = value.clone();
            drop(entries);

            self.touch(key);
            self.stats.write().hits += 1;
            Some(result)
        } else {
            drop(entries);
            self.stats.write().misses += 1;
            None
        }
    }

    /// Insert a block, evicting least recently used entries until the new
    /// value fits the byte budget.
    pub fn insert(&self, key: CacheKey, value: Bytes) {
        if self.capacity == 0 {
            return;
        }

        let value_size = value.len();
        if value_size > self.capacity {
            // A block larger than the whole budget is never cached.
            return;
        }

        while self.current_size.load(Ordering::Relaxed) as usize + value_size > self.capacity {
            self.evict_one();
        }

        let mut entries = self.entries.write();
        let mut lru_queue = self.lru_queue.write();

        if let Some(old_value) = entries.get(&key) {
            self.current_size.fetch_sub(old_value.len() as u64, Ordering::Relaxed);
            lru_queue.retain(|k| k != &key);
        }

        entries.insert(key, value);
        lru_queue.push_back(key);
        self.current_size.fetch_add(value_size as u64, Ordering::Relaxed);

        drop(entries);
        drop(lru_queue);
        self.stats.write().insertions += 1;
    }

    /// Move `key` to the most recently used position.
    fn touch(&self, key: &CacheKey) {
        let mut lru_queue = self.lru_queue.write();
        if let Some(pos) = lru_queue.iter().position(|k| k == key) {
            lru_queue.remove(pos);
        }
        lru_queue.push_back(*key);
    }

    /// Evict the least recently used entry.
    fn evict_one(&self) {
        let mut lru_queue = self.lru_queue.write();
        if let Some(key) = lru_queue.pop_front() {
            drop(lru_queue);

            let mut entries = self.entries.write();
            if let Some(value) = entries.remove(&key) {
                self.current_size.fetch_sub(value.len() as u64, Ordering::Relaxed);
                drop(entries);
                self.stats.write().evictions += 1;
            }
        }
    }

    /// Current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    /// Bytes currently cached.
    pub fn size(&self) -> usize {
        self.current_size.load(Ordering::Relaxed) as usize
    }

    /// The byte budget this cache was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cache_basic_operations() {
        let cache = BlockCache::new(1024);
        let key = CacheKey::new(1, 0);
        let value = Bytes::from_static(&[1, 2, 3, 4]);

        assert_eq!(cache.get(&key), None);

        cache.insert(key, value.clone());
        assert_eq!(cache.get(&key), Some(value));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.insertions, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cache_lru_eviction() {
        // Holds three 4-byte blocks.
        let cache = BlockCache::new(12);
        let value = Bytes::from_static(&[1, 2, 3, 4]);

        for file_id in 1..=3 {
            cache.insert(CacheKey::new(file_id, 0), value.clone());
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.size(), 12);

        // A fourth insert evicts the least recently used entry.
        cache.insert(CacheKey::new(4, 0), value.clone());
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&CacheKey::new(1, 0)), None);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_cache_touch_updates_lru_order() {
        let cache = BlockCache::new(12);
        let value = Bytes::from_static(&[1, 2, 3, 4]);

        cache.insert(CacheKey::new(1, 0), value.clone());
        cache.insert(CacheKey::new(1, 1), value.clone());
        cache.insert(CacheKey::new(1, 2), value.clone());

        // Touch block 0 so block 1 becomes the eviction candidate.
        assert!(cache.get(&CacheKey::new(1, 0)).is_some());
        cache.insert(CacheKey::new(1, 3), value.clone());

        assert!(cache.get(&CacheKey::new(1, 0)).is_some());
        assert_eq!(cache.get(&CacheKey::new(1, 1)), None);
    }

    #[test]
    fn test_cache_disabled_when_capacity_zero() {
        let cache = BlockCache::new(0);
        let key = CacheKey::new(1, 0);
        cache.insert(key, Bytes::from_static(&[1, 2, 3]));
        assert_eq!(cache.get(&key), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cache_returns_independent_views() {
        let cache = BlockCache::new(1024);
        let key = CacheKey::new(9, 4);
        cache.insert(key, Bytes::from_static(b"block payload"));

        let mut view = cache.get(&key).unwrap();
        let _ = view.split_to(6); // consume part of our view

        // The cached copy is unaffected.
        assert_eq!(cache.get(&key).unwrap(), Bytes::from_static(b"block payload"));
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let cache = Arc::new(BlockCache::new(1024));
        let mut handles = Vec::new();

        for i in 0..8u64 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                let key = CacheKey::new(i, i);
                let value = Bytes::from(vec![i as u8; 8]);
                cache.insert(key, value.clone());
                assert_eq!(cache.get(&key), Some(value));
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 8);
    }
}
