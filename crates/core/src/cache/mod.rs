//! Bounded in-memory key/value cache.
//!
//! [`BoundedCache`] holds at most `max_size` entries and evicts the
//! least-recently-used entry whenever an insert pushes it past that bound.
//! Entries that are never read after insertion therefore leave in insertion
//! order. With compression enabled, binary values (see [`CacheValue`]) are
//! gzip-compressed on [`set`](BoundedCache::set) and transparently restored on
//! [`get`](BoundedCache::get).
//!
//! The cache is `Send + Sync` and meant to be shared through an `Arc`; every
//! mutation holds one internal lock for the whole insert + evict step.

mod sweeper;
mod value;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use sweeper::CacheSweeper;
pub use value::{CacheValue, CachedValue};

use crate::config::CacheConfig;
use crate::error::ConfigError;

/// Counters reported by [`BoundedCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
}

enum Slot<V> {
    Plain(V),
    Compressed(Vec<u8>),
}

struct Entry<V> {
    slot: Slot<V>,
    /// Position in the recency order; larger is more recent.
    stamp: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: BTreeMap<u64, K>,
    next_stamp: u64,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn bump(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    fn evict_to(&mut self, max_size: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > max_size {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
        }
        self.stats.evictions += evicted as u64;
        evicted
    }
}

/// Size-bounded LRU cache with optional compression of binary values.
pub struct BoundedCache<K, V> {
    max_size: usize,
    compress: bool,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: CacheValue,
{
    /// Create an uncompressed cache holding at most `max_size` entries.
    pub fn new(max_size: usize) -> Result<Self, ConfigError> {
        Self::build(max_size, false)
    }

    /// Create a cache that gzip-compresses binary values.
    pub fn with_compression(max_size: usize) -> Result<Self, ConfigError> {
        Self::build(max_size, true)
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self, ConfigError> {
        Self::build(config.max_size, config.compress)
    }

    fn build(max_size: usize, compress: bool) -> Result<Self, ConfigError> {
        if max_size == 0 {
            return Err(ConfigError::InvalidCacheCapacity(max_size));
        }
        Ok(Self {
            max_size,
            compress,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_stamp: 0,
                stats: CacheStats::default(),
            }),
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn is_compressing(&self) -> bool {
        self.compress
    }

    /// Insert or overwrite `key`, then evict until the bound holds.
    pub fn set(&self, key: K, value: V) {
        let slot = self.encode(value);
        let mut inner = self.lock();
        let stamp = inner.bump();
        if let Some(old) = inner.entries.insert(key.clone(), Entry { slot, stamp }) {
            inner.order.remove(&old.stamp);
        }
        inner.order.insert(stamp, key);
        let evicted = inner.evict_to(self.max_size);
        if evicted > 0 {
            tracing::debug!(evicted, len = inner.entries.len(), "Cache bound enforced");
        }
    }

    /// Look up `key`, refreshing its recency on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let packed = {
            let mut inner = self.lock();
            let stamp = inner.bump();
            let Some(entry) = inner.entries.get_mut(key) else {
                inner.stats.misses += 1;
                return None;
            };
            let old_stamp = std::mem::replace(&mut entry.stamp, stamp);
            let found = match &entry.slot {
                Slot::Plain(v) => Ok(v.clone()),
                Slot::Compressed(bytes) => Err(bytes.clone()),
            };
            inner.order.remove(&old_stamp);
            inner.order.insert(stamp, key.clone());
            inner.stats.hits += 1;
            match found {
                Ok(v) => return Some(v),
                Err(bytes) => bytes,
            }
        };

        match value::decompress(&packed).map(V::from_binary) {
            Ok(Some(v)) => Some(v),
            Ok(None) => {
                tracing::warn!("Cached value type cannot be rebuilt from bytes; dropping entry");
                self.remove(key);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decompress cached value; dropping entry");
                self.remove(key);
                None
            }
        }
    }

    /// Presence check. Does not affect recency.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.lock();
        match inner.entries.remove(key) {
            Some(entry) => {
                inner.order.remove(&entry.stamp);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enforce the size bound without a write. Returns the number evicted.
    pub fn sweep(&self) -> usize {
        self.lock().evict_to(self.max_size)
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            len: inner.entries.len(),
            ..inner.stats
        }
    }

    fn encode(&self, value: V) -> Slot<V> {
        if !self.compress {
            return Slot::Plain(value);
        }
        let packed = match value.as_binary() {
            Some(bytes) => value::compress(bytes),
            None => return Slot::Plain(value),
        };
        match packed {
            Ok(bytes) => Slot::Compressed(bytes),
            Err(e) => {
                tracing::warn!(error = %e, "Compression failed; storing value uncompressed");
                Slot::Plain(value)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len();
        f.debug_struct("BoundedCache")
            .field("max_size", &self.max_size)
            .field("compress", &self.compress)
            .field("len", &len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn zero_capacity_is_a_config_error() {
        let result = BoundedCache::<String, String>::new(0);
        assert_matches!(result, Err(ConfigError::InvalidCacheCapacity(0)));
    }

    #[test]
    fn debug_shows_bounds_without_contents() {
        let cache = BoundedCache::<String, Vec<u8>>::with_compression(4).expect("cache");
        cache.set("secret-key".to_string(), b"secret-value".to_vec());
        let shown = format!("{cache:?}");
        assert!(shown.contains("max_size: 4"));
        assert!(shown.contains("compress: true"));
        assert!(shown.contains("len: 1"));
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn size_never_exceeds_bound_after_set() {
        for max_size in 1..6usize {
            let cache = BoundedCache::<u32, u64>::new(max_size).expect("cache");
            for i in 0..40u32 {
                cache.set(i % 13, u64::from(i));
                assert!(cache.len() <= max_size, "len {} > {max_size}", cache.len());
            }
        }
    }

    #[test]
    fn evicts_oldest_inserted_when_never_read() {
        let cache = BoundedCache::<&str, i64>::new(2).expect("cache");
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        assert!(!cache.contains(&"a"));
        assert!(cache.contains(&"b"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = BoundedCache::<&str, i64>::new(2).expect("cache");
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("c", 3);
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"), "b was least recently used");
    }

    #[test]
    fn overwrite_does_not_grow_and_refreshes() {
        let cache = BoundedCache::<&str, i64>::new(2).expect("cache");
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        assert_eq!(cache.len(), 2);
        cache.set("c", 3);
        assert_eq!(cache.get(&"a"), Some(10));
        assert!(!cache.contains(&"b"));
    }

    #[test]
    fn remove_and_clear() {
        let cache = BoundedCache::<&str, i64>::new(4).expect("cache");
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.remove(&"a"));
        assert!(!cache.remove(&"a"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn compressed_binary_round_trips_byte_exact() {
        let cache = BoundedCache::<String, Vec<u8>>::with_compression(4).expect("cache");
        let blob: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        cache.set("frames".into(), blob.clone());
        assert_eq!(cache.get(&"frames".to_string()), Some(blob));
    }

    #[test]
    fn compression_skips_scalars() {
        let cache = BoundedCache::<&str, CachedValue>::with_compression(4).expect("cache");
        cache.set("t", CachedValue::Text("hello".into()));
        cache.set("n", CachedValue::Integer(42));
        cache.set("b", CachedValue::Bytes(vec![0, 1, 2, 255]));
        assert_eq!(cache.get(&"t"), Some(CachedValue::Text("hello".into())));
        assert_eq!(cache.get(&"n"), Some(CachedValue::Integer(42)));
        assert_eq!(cache.get(&"b"), Some(CachedValue::Bytes(vec![0, 1, 2, 255])));
    }

    #[test]
    fn stats_track_hits_misses_and_evictions() {
        let cache = BoundedCache::<u8, bool>::new(1).expect("cache");
        cache.set(1, true);
        cache.set(2, false);
        let _ = cache.get(&2);
        let _ = cache.get(&1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.len, 1);
    }

    #[test]
    fn concurrent_writers_respect_bound() {
        let cache = Arc::new(BoundedCache::<u32, u64>::new(8).expect("cache"));
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..500u32 {
                        cache.set(t * 1000 + i, u64::from(i));
                        assert!(cache.len() <= 8);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread");
        }
        assert_eq!(cache.len(), 8);
    }
}
