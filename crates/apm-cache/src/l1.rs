//! L1 in-memory tier: a moka cache keyed by the same content hash the L2
//! tier uses, with true weighted-LRU eviction instead of a fixed entry
//! count.

use bytes::Bytes;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A blob held in the L1 tier, possibly zstd-compressed.
#[derive(Debug, Clone)]
pub struct L1Entry {
    /// Raw bytes as stored (compressed, if `compressed`).
    pub data: Bytes,
    /// Size of `data` in bytes.
    pub size: u64,
    /// Size of the original, uncompressed artifact.
    pub original_size: u64,
    /// Whether `data` is zstd-compressed.
    pub compressed: bool,
    /// blake3 hash of the original artifact, for verification on read.
    pub hash: [u8; 32],
}

impl L1Entry {
    #[must_use]
    pub fn new(data: Bytes, original_size: u64, compressed: bool, hash: [u8; 32]) -> Self {
        Self {
            size: data.len() as u64,
            data,
            original_size,
            compressed,
            hash,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Data size plus a fixed estimate for the struct's own fields, so
    /// moka's weighted capacity tracks actual memory pressure rather
    /// than raw payload bytes alone.
    #[inline]
    fn weight(&self) -> u32 {
        let total = self.data.len() + std::mem::size_of::<Self>();
        total.try_into().unwrap_or(u32::MAX)
    }
}

/// Weighted-LRU in-memory cache fronting [`crate::l2::L2Cache`].
pub struct L1Cache {
    cache: Cache<String, Arc<L1Entry>>,
    max_size: u64,
    insertions: AtomicU64,
    evictions: AtomicU64,
}

impl std::fmt::Debug for L1Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1Cache")
            .field("max_size", &self.max_size)
            .field("current_size", &self.cache.weighted_size())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl L1Cache {
    #[must_use]
    pub fn new(max_size: u64, ttl: Option<Duration>) -> Self {
        L1CacheBuilder::new().max_size(max_size).maybe_ttl(ttl).build()
    }

    /// Get an entry by its content-hash key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<L1Entry>> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: String, entry: L1Entry) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
        self.cache.insert(key, Arc::new(entry));
    }

    pub fn remove(&self, key: &str) {
        self.cache.invalidate(key);
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.entry_count() == 0
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.cache.weighted_size()
    }

    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    #[must_use]
    pub fn fill_ratio(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        self.cache.weighted_size() as f64 / self.max_size as f64
    }

    /// Drives eviction/expiration bookkeeping; moka does this lazily
    /// otherwise, which makes size/len assertions flaky right after a
    /// burst of inserts.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    #[must_use]
    pub fn insertion_count(&self) -> u64 {
        self.insertions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Iterates live entries, used by `TieredCache::warm` to pull L2
    /// entries up without going through a `get`/`insert` round trip.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &L1Entry),
    {
        for (key, value) in self.cache.iter() {
            f(&key, &value);
        }
    }
}

/// Fluent builder for [`L1Cache`].
#[derive(Debug, Default)]
pub struct L1CacheBuilder {
    max_size: Option<u64>,
    ttl: Option<Duration>,
}

impl L1CacheBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn max_size(mut self, size: u64) -> Self {
        self.max_size = Some(size);
        self
    }

    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    const fn maybe_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn build(self) -> L1Cache {
        let max_size = self.max_size.unwrap_or(64 * 1024 * 1024);
        let evictions = Arc::new(AtomicU64::new(0));
        let evictions_clone = Arc::clone(&evictions);

        let mut builder = Cache::builder()
            .max_capacity(max_size)
            .weigher(|_key: &String, value: &Arc<L1Entry>| value.weight())
            .eviction_listener(move |_key, _value, _cause| {
                evictions_clone.fetch_add(1, Ordering::Relaxed);
            });

        if let Some(ttl) = self.ttl {
            builder = builder.time_to_live(ttl);
        }

        let evictions_inner = Arc::try_unwrap(evictions)
            .unwrap_or_else(|arc| AtomicU64::new(arc.load(Ordering::Relaxed)));

        L1Cache {
            cache: builder.build(),
            max_size,
            insertions: AtomicU64::new(0),
            evictions: evictions_inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l1_basic_operations() {
        let cache = L1Cache::new(1024 * 1024, None);
        let entry = L1Entry::new(Bytes::from("test data"), 9, false, [0u8; 32]);

        cache.insert("key1".to_string(), entry);
        cache.run_pending_tasks();

        assert!(cache.contains("key1"));
        assert!(!cache.contains("key2"));

        let retrieved = cache.get("key1").expect("should exist");
        assert_eq!(retrieved.data(), b"test data");

        cache.remove("key1");
        cache.run_pending_tasks();
        assert!(!cache.contains("key1"));
    }

    #[test]
    fn l1_size_tracking() {
        let cache = L1Cache::new(1024 * 1024, None);
        cache.insert(
            "key1".to_string(),
            L1Entry::new(Bytes::from(vec![0u8; 100]), 100, false, [0u8; 32]),
        );
        cache.insert(
            "key2".to_string(),
            L1Entry::new(Bytes::from(vec![0u8; 200]), 200, false, [0u8; 32]),
        );
        cache.run_pending_tasks();

        assert!(cache.size() >= 300);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn l1_lru_eviction() {
        let cache = L1Cache::new(500, None);
        for i in 0..10 {
            let entry = L1Entry::new(Bytes::from(vec![i as u8; 100]), 100, false, [i as u8; 32]);
            cache.insert(format!("key{i}"), entry);
        }
        cache.run_pending_tasks();

        assert!(cache.len() < 10);
        assert!(cache.size() <= 500);
    }

    #[test]
    fn l1_clear() {
        let cache = L1Cache::new(1024, None);
        cache.insert(
            "key1".to_string(),
            L1Entry::new(Bytes::from("data"), 4, false, [0u8; 32]),
        );
        cache.run_pending_tasks();

        cache.clear();
        cache.run_pending_tasks();
        assert!(cache.is_empty());
    }

    #[test]
    fn l1_builder() {
        let cache = L1CacheBuilder::new()
            .max_size(512 * 1024)
            .ttl(Duration::from_secs(3600))
            .build();
        assert_eq!(cache.max_size(), 512 * 1024);
    }

    #[test]
    fn l1_fill_ratio() {
        let cache = L1Cache::new(1000, None);
        cache.insert(
            "key1".to_string(),
            L1Entry::new(Bytes::from(vec![0u8; 400]), 400, false, [0u8; 32]),
        );
        cache.run_pending_tasks();

        let ratio = cache.fill_ratio();
        assert!(ratio > 0.0);
        assert!(ratio <= 1.0);
    }
}
