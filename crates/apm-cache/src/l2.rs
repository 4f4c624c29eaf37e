//! L2 disk-based content-addressable storage.
//!
//! Blobs are stored under their blake3 hash, giving content-addressable
//! storage with automatic deduplication across identical Universe
//! snapshots or Plan artifacts.

use crate::compression;
use crate::config::{CacheConfig, CacheEntryType};
use crate::index::{create_entry, CacheIndex, IndexEntry};
use apm_core::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

fn io_err(path: &Path, err: std::io::Error) -> Error {
    Error::operation_failed(format!("io error at {}: {err}", path.display()))
}

/// A content hash as stored in the index: hex-encoded blake3 digest.
#[must_use]
pub fn hash_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

const ENTRY_TYPES: [CacheEntryType; 2] = [CacheEntryType::UniverseSnapshot, CacheEntryType::PlanArtifact];

/// L2 disk-based cache.
pub struct L2Cache {
    root: PathBuf,
    index: CacheIndex,
    config: CacheConfig,
}

impl std::fmt::Debug for L2Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L2Cache")
            .field("root", &self.root)
            .field("entries", &self.index.len())
            .finish()
    }
}

impl L2Cache {
    /// # Errors
    /// Returns an error if the cache directory tree or index cannot be
    /// created.
    pub fn open(root: PathBuf, config: CacheConfig) -> Result<Self> {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

        for entry_type in ENTRY_TYPES {
            let subdir = root.join(entry_type.subdir());
            fs::create_dir_all(&subdir).map_err(|e| io_err(&subdir, e))?;
        }

        let index = CacheIndex::open(root.join("index.json"))?;

        Ok(Self { root, index, config })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// # Errors
    /// Returns an error if the stored blob cannot be read or decompressed.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.index.get(key) else {
            return Ok(None);
        };

        if entry.is_expired() {
            debug!(key, "cache entry expired");
            return Ok(None);
        }

        let path = self.root.join(&entry.path);
        if !path.exists() {
            warn!(path = %path.display(), "cache file missing");
            self.index.remove(key);
            return Ok(None);
        }

        let data = fs::read(&path).map_err(|e| io_err(&path, e))?;

        let data = if entry.compressed {
            if let Some(compressed) = compression::strip_magic(&data) {
                compression::decompress_with_hint(compressed, entry.original_size as usize)
                    .map_err(|e| Error::operation_failed(format!("decompression failed: {e}")))?
            } else {
                data
            }
        } else {
            data
        };

        self.index.touch(key);
        Ok(Some(data))
    }

    /// Reads the stored blob without decompressing it, for L1 warming
    /// where the raw (possibly compressed) bytes are what L1 stores.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn get_raw(&self, key: &str) -> Result<Option<(Vec<u8>, IndexEntry)>> {
        let Some(entry) = self.index.get(key) else {
            return Ok(None);
        };

        if entry.is_expired() {
            return Ok(None);
        }

        let path = self.root.join(&entry.path);
        if !path.exists() {
            self.index.remove(key);
            return Ok(None);
        }

        let data = fs::read(&path).map_err(|e| io_err(&path, e))?;
        self.index.touch(key);
        Ok(Some((data, entry)))
    }

    /// Stores `data`, keyed by its blake3 hash. A no-op (besides bumping
    /// the access time) if the content is already cached.
    ///
    /// # Errors
    /// Returns an error if compression or the atomic write fails.
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
    /// Universe refresh fingerprint rather than a content hash).
    ///
    /// # Errors
    /// Returns an error if compression or the atomic write fails.
    pub fn put_with_key(
        &self,
        key: &str,
        data: &[u8],
        entry_type: CacheEntryType,
        ttl: Option<Duration>,
        metadata: Option<String>,
    ) -> Result<()> {
        if self.index.contains(key) {
            debug!(key, "already cached");
            self.index.touch(key);
            return Ok(());
        }

        let ttl = ttl.unwrap_or_else(|| entry_type.ttl(&self.config));

        let (final_data, compressed) =
            if self.config.compression_enabled && compression::should_compress(data) {
                let compressed = compression::compress(data, self.config.compression_level)
                    .map_err(|e| Error::operation_failed(format!("compression failed: {e}")))?;
                if compressed.len() < data.len() {
                    (compression::with_magic(compressed), true)
                } else {
                    (data.to_vec(), false)
                }
            } else {
                (data.to_vec(), false)
            };

        let subdir = entry_type.subdir();
        let filename = format!("{}.bin", &key[..key.len().min(16)]);
        let relative_path = format!("{subdir}/{filename}");
        let full_path = self.root.join(&relative_path);

        self.write_atomic(&full_path, &final_data)?;

        let entry = create_entry(
            key.to_string(),
            entry_type,
            final_data.len() as u64,
            data.len() as u64,
            compressed,
            ttl,
            relative_path,
            metadata.unwrap_or_else(|| "{}".to_string()),
        );
        self.index.insert(entry);

        debug!(key, size = data.len(), compressed_size = final_data.len(), "cached to L2");
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let Some(entry) = self.index.get(key) else {
            return false;
        };
        if entry.is_expired() {
            return false;
        }
        self.root.join(&entry.path).exists()
    }

    /// # Errors
    /// Returns an error if the stored file exists but cannot be removed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        if let Some(entry) = self.index.remove(key) {
            let path = self.root.join(&entry.path);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    #[must_use]
    pub fn keys_by_type(&self, entry_type: CacheEntryType) -> Vec<String> {
        self.index.find_by_type(entry_type).into_iter().map(|e| e.key).collect()
    }

    /// # Errors
    /// Returns an error only in the (unexpected) event the index itself
    /// is unreadable; individual file-removal failures are swallowed.
    pub fn clear_by_type(&self, entry_type: CacheEntryType) -> Result<usize> {
        let entries = self.index.find_by_type(entry_type);
        let mut removed = 0;
        for entry in entries {
            let path = self.root.join(&entry.path);
            if path.exists() {
                let _ = fs::remove_file(&path);
            }
            self.index.remove(&entry.key);
            removed += 1;
        }
        Ok(removed)
    }

    /// # Errors
    /// Returns an error if a subdirectory cannot be recreated after
    /// being wiped.
    pub fn clear(&self) -> Result<()> {
        for entry_type in ENTRY_TYPES {
            let subdir = self.root.join(entry_type.subdir());
            if subdir.exists() {
                let _ = fs::remove_dir_all(&subdir);
                fs::create_dir_all(&subdir).map_err(|e| io_err(&subdir, e))?;
            }
        }
        self.index.clear();
        Ok(())
    }

    pub fn remove_expired(&self) -> usize {
        let expired = self.index.find_expired();
        let mut removed = 0;
        for key in expired {
            if let Some(entry) = self.index.remove(&key) {
                let path = self.root.join(&entry.path);
                let _ = fs::remove_file(&path);
                removed += 1;
            }
        }
        removed
    }

    /// Removes the least-recently-used entries until at least
    /// `target_bytes` has been freed, scanning at most 100 candidates
    /// per call (callers loop if more is needed).
    pub fn evict_lru(&self, target_bytes: u64) -> usize {
        let mut freed = 0u64;
        let mut removed = 0;

        for entry in self.index.find_oldest(100) {
            if freed >= target_bytes {
                break;
            }
            let path = self.root.join(&entry.path);
            let _ = fs::remove_file(&path);
            self.index.remove(&entry.key);
            freed += entry.size;
            removed += 1;
        }

        debug!(removed, freed, "evicted LRU entries");
        removed
    }

    #[must_use]
    pub fn disk_usage(&self) -> u64 {
        self.index.total_size()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// # Errors
    /// Returns an error if the index cannot be written to disk.
    pub fn flush(&self) -> Result<()> {
        self.index.flush()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.index.entries()
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

        let mut temp = NamedTempFile::new_in(parent).map_err(|e| io_err(parent, e))?;
        temp.write_all(data).map_err(|e| io_err(path, e))?;
        temp.flush().map_err(|e| io_err(path, e))?;
        temp.persist(path).map_err(|e| io_err(path, e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_basic_operations() {
        let dir = tempfile::tempdir().unwrap();
        let cache = L2Cache::open(dir.path().join("cache"), CacheConfig::default()).unwrap();

        let data = b"test data for caching";
        let key = cache.put(data, CacheEntryType::UniverseSnapshot, None, None).unwrap();

        assert!(cache.contains(&key));
        let retrieved = cache.get(&key).unwrap().unwrap();
        assert_eq!(retrieved, data);

        cache.remove(&key).unwrap();
        assert!(!cache.contains(&key));
    }

    #[test]
    fn l2_compression() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            compression_enabled: true,
            compression_level: 3,
            ..Default::default()
        };
        let cache = L2Cache::open(dir.path().join("cache"), config).unwrap();

        let data = vec![0u8; 10000];
        let key = cache.put(&data, CacheEntryType::UniverseSnapshot, None, None).unwrap();

        let retrieved = cache.get(&key).unwrap().unwrap();
        assert_eq!(retrieved, data);
    }

    #[test]
    fn l2_clear_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let cache = L2Cache::open(dir.path().join("cache"), CacheConfig::default()).unwrap();

        cache.put(b"snapshot data", CacheEntryType::UniverseSnapshot, None, None).unwrap();
        cache.put(b"plan data", CacheEntryType::PlanArtifact, None, None).unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear_by_type(CacheEntryType::UniverseSnapshot).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
