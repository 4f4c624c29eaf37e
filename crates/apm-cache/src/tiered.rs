//! The two-tier cache that backs A4: an L1 (memory) cache fronting an L2
//! (disk) cache, both keyed by the stored artifact's blake3 hash, plus
//! background GC and warming.

use crate::compression;
use crate::config::{CacheConfig, CacheEntryType};
use crate::l1::{L1Cache, L1Entry};
use crate::l2::{hash_hex, L2Cache};
use crate::stats::{CacheStats, CacheStatsSnapshot, SizeTracker};
use apm_core::{Error, Result};
use bytes::Bytes;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Which artifact kinds a `clear_by_pattern` call should drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearPattern {
    /// Just cached Universe snapshots.
    UniverseSnapshots,
    /// Just cached Plan artifacts.
    PlanArtifacts,
    /// Both.
    All,
}

impl ClearPattern {
    #[must_use]
    pub fn entry_types(self) -> Vec<CacheEntryType> {
        match self {
            Self::UniverseSnapshots => vec![CacheEntryType::UniverseSnapshot],
            Self::PlanArtifacts => vec![CacheEntryType::PlanArtifact],
            Self::All => vec![CacheEntryType::UniverseSnapshot, CacheEntryType::PlanArtifact],
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "universe" | "snapshots" | "snapshot" => Some(Self::UniverseSnapshots),
            "plans" | "plan" | "artifacts" => Some(Self::PlanArtifacts),
            "all" | "*" => Some(Self::All),
            _ => None,
        }
    }
}

/// Multi-tier content-addressable cache of Universe snapshots and Plan
/// artifacts.
pub struct TieredCache {
    l1: L1Cache,
    l2: L2Cache,
    root: PathBuf,
    config: CacheConfig,
    stats: Arc<CacheStats>,
    size_tracker: SizeTracker,
    warming: AtomicBool,
    shutdown: Arc<Notify>,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("l1", &self.l1)
            .field("l2", &self.l2)
            .field("root", &self.root)
            .field("warming", &self.warming.load(Ordering::Relaxed))
            .finish()
    }
}

impl TieredCache {
    /// # Errors
    /// Returns an error if `config.root` is unset, or the cache
    /// directory cannot be created.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        let root = config
            .root
            .clone()
            .ok_or_else(|| Error::invalid_parameters("cache config has no root directory set"))?;
        Self::at_path(root, config)
    }

    /// # Errors
    /// Returns an error if the cache directory cannot be created.
    pub fn at_path(root: PathBuf, config: CacheConfig) -> Result<Self> {
        let l1_ttl = config.universe_snapshot_ttl.min(config.plan_artifact_ttl);
        let l1 = L1Cache::new(config.l1_size_limit, Some(l1_ttl));
        let l2 = L2Cache::open(root.clone(), config.clone())?;

        Ok(Self {
            l1,
            l2,
            root,
            config,
            stats: Arc::new(CacheStats::new()),
            size_tracker: SizeTracker::new(),
            warming: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Looks up `key` in L1, then L2 (promoting on an L2 hit).
    ///
    /// # Errors
    /// Returns an error if a stored blob is corrupt or cannot be
    /// decompressed.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let start = Instant::now();

        if let Some(entry) = self.l1.get(key) {
            self.stats.record_hit(true);
            self.stats.record_bytes_read(entry.original_size);
            self.stats.record_lookup_time(start.elapsed());
            return Ok(Some(decompress_entry(&entry.data, entry.compressed, entry.original_size)?));
        }

        if let Some((raw_data, index_entry)) = self.l2.get_raw(key)? {
            self.stats.record_hit(false);
            self.stats.record_bytes_read(index_entry.original_size);

            let hash = blake3::hash(&raw_data);
            let l1_entry = L1Entry::new(
                Bytes::from(raw_data.clone()),
                index_entry.original_size,
                index_entry.compressed,
                *hash.as_bytes(),
            );
            self.l1.insert(key.to_string(), l1_entry);

            let data = decompress_entry(&raw_data, index_entry.compressed, index_entry.original_size)?;
            self.stats.record_lookup_time(start.elapsed());
            return Ok(Some(data));
        }

        self.stats.record_miss();
        self.stats.record_lookup_time(start.elapsed());
        Ok(None)
    }

    /// Stores `data`, keyed by its blake3 hash.
    ///
    /// # Errors
    /// Returns an error if compression or the L2 write fails.
    pub fn put(
        &self,
        data: &[u8],
        entry_type: CacheEntryType,
        ttl: Option<Duration>,
        metadata: Option<String>,
    ) -> Result<String> {
        let key = hash_hex(data);
        self.put_with_key(&key, data, entry_type, ttl, metadata)?;
        Ok(key)
    }

    /// Same as [`Self::put`], but the caller supplies the key (e.g. a
    /// Universe backend's refresh fingerprint).
    ///
    /// # Errors
    /// Returns an error if compression or the L2 write fails.
    pub fn put_with_key(
        &self,
        key: &str,
        data: &[u8],
        entry_type: CacheEntryType,
        ttl: Option<Duration>,
        metadata: Option<String>,
    ) -> Result<()> {
        self.l2.put_with_key(key, data, entry_type, ttl, metadata)?;

        let (l1_data, compressed) = maybe_compress(data, &self.config)?;
        let hash = blake3::hash(data);
        let l1_entry = L1Entry::new(Bytes::from(l1_data), data.len() as u64, compressed, *hash.as_bytes());
        self.l1.insert(key.to_string(), l1_entry);

        self.stats.record_bytes_written(data.len() as u64);
        self.size_tracker.add(data.len() as u64);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.l1.contains(key) || self.l2.contains(key)
    }

    /// # Errors
    /// Returns an error if the stored file exists but cannot be removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.l1.remove(key);
        let removed = self.l2.remove(key)?;
        if removed {
            self.stats.record_eviction();
        }
        Ok(removed)
    }

    /// # Errors
    /// Returns an error only if the index itself is unreadable.
    pub fn clear_by_type(&self, entry_type: CacheEntryType) -> Result<usize> {
        for key in self.l2.keys_by_type(entry_type) {
            self.l1.remove(&key);
        }
        self.l2.clear_by_type(entry_type)
    }

    /// # Errors
    /// Returns an error if any of `pattern`'s entry types fail to clear.
    pub fn clear_by_pattern(&self, pattern: ClearPattern) -> Result<ClearResult> {
        let start = Instant::now();
        let mut total_removed = 0;
        let mut removed_by_type = Vec::new();

        for entry_type in pattern.entry_types() {
            let removed = self.clear_by_type(entry_type)?;
            removed_by_type.push((entry_type, removed));
            total_removed += removed;
        }

        Ok(ClearResult {
            pattern,
            total_removed,
            removed_by_type,
            duration: start.elapsed(),
        })
    }

    /// # Errors
    /// Returns an error if the L2 directory tree cannot be wiped.
    pub fn clear(&self) -> Result<()> {
        self.l1.clear();
        self.l2.clear()?;
        self.stats.reset();
        self.size_tracker.reset();
        info!("cache cleared");
        Ok(())
    }

    /// Removes expired entries, then LRU-evicts until under
    /// `l2_size_limit` if still over.
    ///
    /// # Errors
    /// Returns an error if the index cannot be consulted.
    pub fn gc(&self) -> Result<GcResult> {
        let start = Instant::now();

        let expired = self.l2.remove_expired();

        let disk_usage = self.l2.disk_usage();
        let evicted = if disk_usage > self.config.l2_size_limit {
            self.l2.evict_lru(disk_usage - self.config.l2_size_limit)
        } else {
            0
        };

        self.l1.run_pending_tasks();
        for _ in 0..(expired + evicted) {
            self.stats.record_expiration();
        }

        let result = GcResult {
            expired_removed: expired,
            lru_evicted: evicted,
            duration: start.elapsed(),
        };
        debug!(?result, "garbage collection complete");
        Ok(result)
    }

    /// Pulls the most-recently-accessed L2 entries into L1, up to
    /// `l1_size_limit`. A no-op if warming is already in progress.
    pub fn warm(&self) {
        if self.warming.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut sorted = self.l2.entries();
        sorted.sort_by(|a, b| b.accessed_at.cmp(&a.accessed_at));

        let mut warmed = 0;
        for entry in sorted {
            if entry.is_expired() || self.l1.contains(&entry.key) {
                continue;
            }
            if self.l1.size() + entry.size > self.config.l1_size_limit {
                break;
            }
            if let Ok(Some((data, _))) = self.l2.get_raw(&entry.key) {
                let hash = blake3::hash(&data);
                let l1_entry = L1Entry::new(
                    Bytes::from(data),
                    entry.original_size,
                    entry.compressed,
                    *hash.as_bytes(),
                );
                self.l1.insert(entry.key, l1_entry);
                warmed += 1;
            }
        }

        self.warming.store(false, Ordering::SeqCst);
        debug!(warmed, "cache warming complete");
    }

    /// Spawns the background GC loop, ticking every `gc_interval` until
    /// [`Self::shutdown`] is called.
    pub fn start_background_tasks(self: &Arc<Self>) {
        let cache = Arc::clone(self);
        let gc_interval = cache.config.gc_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(gc_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = cache.gc() {
                            warn!(error = %e, "background GC failed");
                        }
                    }
                    _ = cache.shutdown.notified() => break,
                }
            }
        });
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn l1_fill_ratio(&self) -> f64 {
        self.l1.fill_ratio()
    }

    #[must_use]
    pub fn l2_disk_usage(&self) -> u64 {
        self.l2.disk_usage()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.l2.len()
    }

    /// # Errors
    /// Returns an error if the index cannot be flushed.
    pub fn flush(&self) -> Result<()> {
        self.l2.flush()
    }
}

fn maybe_compress(data: &[u8], config: &CacheConfig) -> Result<(Vec<u8>, bool)> {
    if config.compression_enabled && compression::should_compress(data) {
        let compressed = compression::compress(data, config.compression_level)
            .map_err(|e| Error::operation_failed(format!("compression failed: {e}")))?;
        if compressed.len() < data.len() {
            return Ok((compression::with_magic(compressed), true));
        }
    }
    Ok((data.to_vec(), false))
}

fn decompress_entry(data: &[u8], compressed: bool, original_size: u64) -> Result<Vec<u8>> {
    if !compressed {
        return Ok(data.to_vec());
    }
    match compression::strip_magic(data) {
        Some(body) => compression::decompress_with_hint(body, original_size as usize)
            .map_err(|e| Error::operation_failed(format!("decompression failed: {e}"))),
        None => Ok(data.to_vec()),
    }
}

impl Drop for TieredCache {
    fn drop(&mut self) {
        self.shutdown();
        let _ = self.flush();
    }
}

/// Outcome of one [`TieredCache::gc`] sweep.
#[derive(Debug, Clone)]
pub struct GcResult {
    pub expired_removed: usize,
    pub lru_evicted: usize,
    pub duration: Duration,
}

/// Outcome of one [`TieredCache::clear_by_pattern`] call.
#[derive(Debug, Clone)]
pub struct ClearResult {
    pub pattern: ClearPattern,
    pub total_removed: usize,
    pub removed_by_type: Vec<(CacheEntryType, usize)>,
    pub duration: Duration,
}

impl ClearResult {
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Cleared {} entries in {:.2}ms",
            self.total_removed,
            self.duration.as_secs_f64() * 1000.0
        )];

        for (entry_type, count) in &self.removed_by_type {
            if *count > 0 {
                lines.push(format!("  {}: {}", entry_type.subdir(), count));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(dir: &std::path::Path) -> CacheConfig {
        CacheConfig {
            root: Some(dir.join("cache")),
            ..Default::default()
        }
    }

    #[test]
    fn tiered_basic_operations() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::with_config(config_at(dir.path())).unwrap();

        let data = b"test data for tiered cache";
        let key = cache.put(data, CacheEntryType::UniverseSnapshot, None, None).unwrap();

        assert!(cache.contains(&key));
        let retrieved = cache.get(&key).unwrap().unwrap();
        assert_eq!(retrieved, data);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.l1_hits, 1);
    }

    #[test]
    fn tiered_l2_promotion() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            l1_size_limit: 1024,
            ..config_at(dir.path())
        };
        let cache = TieredCache::with_config(config).unwrap();

        let data = b"test data";
        let key = cache.put(data, CacheEntryType::UniverseSnapshot, None, None).unwrap();

        cache.l1.clear();

        let retrieved = cache.get(&key).unwrap().unwrap();
        assert_eq!(retrieved, data);
        assert_eq!(cache.stats().l2_hits, 1);

        let _ = cache.get(&key).unwrap().unwrap();
        assert_eq!(cache.stats().l1_hits, 1);
    }

    #[test]
    fn tiered_clear_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::with_config(config_at(dir.path())).unwrap();

        cache.put(b"snapshot data", CacheEntryType::UniverseSnapshot, None, None).unwrap();
        cache.put(b"plan data", CacheEntryType::PlanArtifact, None, None).unwrap();
        assert_eq!(cache.entry_count(), 2);

        let result = cache.clear_by_pattern(ClearPattern::UniverseSnapshots).unwrap();
        assert_eq!(result.total_removed, 1);
        assert_eq!(cache.entry_count(), 1);

        let result = cache.clear_by_pattern(ClearPattern::All).unwrap();
        assert_eq!(result.total_removed, 1);
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn clear_pattern_parsing() {
        assert_eq!(ClearPattern::from_str("universe"), Some(ClearPattern::UniverseSnapshots));
        assert_eq!(ClearPattern::from_str("plans"), Some(ClearPattern::PlanArtifacts));
        assert_eq!(ClearPattern::from_str("all"), Some(ClearPattern::All));
        assert_eq!(ClearPattern::from_str("*"), Some(ClearPattern::All));
        assert_eq!(ClearPattern::from_str("invalid"), None);
    }

    #[test]
    fn gc_removes_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TieredCache::with_config(config_at(dir.path())).unwrap();

        cache
            .put(b"stale", CacheEntryType::PlanArtifact, Some(Duration::from_secs(0)), None)
            .unwrap();
        std::thread::sleep(Duration::from_millis(10));

        let result = cache.gc().unwrap();
        assert_eq!(result.expired_removed, 1);
        assert_eq!(cache.entry_count(), 0);
    }
}
