use jio_utils::mem_size::MemSizeEstimator;
use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
    bytes: usize,
}

/// LRU cache bounded by the estimated memory footprint of its values.
///
/// Interior mutability lets readers refresh recency through a shared reference.
pub struct MemSizeLruCache<K: Hash + Eq, V> {
    inner: Mutex<Inner<K, V>>,
    max_bytes: usize,
}

impl<K: Hash + Eq + Clone, V: Clone + MemSizeEstimator> MemSizeLruCache<K, V> {
    pub fn new(max_bytes: usize) -> Self {
        Self { inner: Mutex::new(Inner { entries: LruCache::unbounded(), bytes: 0 }), max_bytes }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains(key)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let size = value.estimate_mem_bytes();
        if let Some(old) = inner.entries.put(key, value) {
            inner.bytes -= old.estimate_mem_bytes();
        }
        inner.bytes += size;
        while inner.bytes > self.max_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => inner.bytes -= evicted.estimate_mem_bytes(),
                None => break,
            }
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let removed = inner.entries.pop(key);
        if let Some(v) = &removed {
            inner.bytes -= v.estimate_mem_bytes();
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.lock().bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Blob(usize);

    impl MemSizeEstimator for Blob {
        fn estimate_mem_bytes(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn test_evicts_least_recently_used_by_bytes() {
        let cache = MemSizeLruCache::new(100);
        cache.insert(1, Blob(40));
        cache.insert(2, Blob(40));
        // Touch 1 so that 2 is the eviction candidate
        assert!(cache.get(&1).is_some());
        cache.insert(3, Blob(40));
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
        assert_eq!(cache.size_bytes(), 80);
    }

    #[test]
    fn test_replace_and_remove_track_bytes() {
        let cache = MemSizeLruCache::new(1000);
        cache.insert("a", Blob(10));
        cache.insert("a", Blob(30));
        assert_eq!(cache.size_bytes(), 30);
        assert!(cache.remove(&"a").is_some());
        assert_eq!(cache.size_bytes(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oversized_value_is_not_retained() {
        let cache = MemSizeLruCache::new(10);
        cache.insert(1, Blob(11));
        assert!(cache.is_empty());
    }
}
