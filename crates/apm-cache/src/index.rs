//! On-disk metadata index: one JSON document mapping content-hash keys
//! to [`IndexEntry`] records, written atomically on `flush`.

use crate::config::CacheEntryType;
use apm_core::{to_json_pretty, Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn io_err(path: &std::path::Path, err: std::io::Error) -> Error {
    Error::operation_failed(format!("io error at {}: {err}", path.display()))
}

/// A single cached blob's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    /// Entry type, stored compactly via `CacheEntryType::as_u8`.
    pub entry_type: u8,
    /// Stored (possibly compressed) size, in bytes.
    pub size: u64,
    pub original_size: u64,
    pub compressed: bool,
    pub created_at: u64,
    pub accessed_at: u64,
    pub ttl_secs: u64,
    /// Blob path relative to the cache root.
    pub path: String,
    /// Caller-supplied metadata, opaque JSON.
    pub metadata: String,
}

impl IndexEntry {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        now_secs() > self.created_at + self.ttl_secs
    }

    #[must_use]
    pub fn time_to_expiry(&self) -> Duration {
        let expires_at = self.created_at + self.ttl_secs;
        let now = now_secs();
        if now >= expires_at {
            Duration::ZERO
        } else {
            Duration::from_secs(expires_at - now)
        }
    }

    #[must_use]
    pub const fn cache_entry_type(&self) -> CacheEntryType {
        CacheEntryType::from_u8(self.entry_type)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// In-memory index, persisted as one JSON file per cache root.
pub struct CacheIndex {
    path: PathBuf,
    entries: RwLock<HashMap<String, IndexEntry>>,
    dirty: RwLock<bool>,
}

impl std::fmt::Debug for CacheIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheIndex")
            .field("path", &self.path)
            .field("entries_count", &self.entries.read().len())
            .field("dirty", &*self.dirty.read())
            .finish()
    }
}

impl CacheIndex {
    /// # Errors
    /// Returns an error if an existing index file is present but
    /// unreadable for a reason other than being corrupt (corrupt data
    /// degrades to an empty index rather than erroring, so a single
    /// damaged index never blocks startup).
    pub fn open(path: PathBuf) -> Result<Self> {
        let index = Self {
            path,
            entries: RwLock::new(HashMap::new()),
            dirty: RwLock::new(false),
        };
        if index.path.exists() {
            index.load()?;
        }
        Ok(index)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<IndexEntry> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, entry: IndexEntry) {
        self.entries.write().insert(entry.key.clone(), entry);
        *self.dirty.write() = true;
    }

    pub fn remove(&self, key: &str) -> Option<IndexEntry> {
        let removed = self.entries.write().remove(key);
        if removed.is_some() {
            *self.dirty.write() = true;
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.entries.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.entries.read().values().map(|e| e.size).sum()
    }

    #[must_use]
    pub fn find_expired(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect()
    }

    #[must_use]
    pub fn find_by_type(&self, entry_type: CacheEntryType) -> Vec<IndexEntry> {
        let type_id = entry_type.as_u8();
        self.entries
            .read()
            .values()
            .filter(|e| e.entry_type == type_id)
            .cloned()
            .collect()
    }

    /// Entries sorted oldest-accessed-first, for LRU eviction.
    #[must_use]
    pub fn find_oldest(&self, count: usize) -> Vec<IndexEntry> {
        let mut sorted: Vec<_> = self.entries.read().values().cloned().collect();
        sorted.sort_by_key(|e| e.accessed_at);
        sorted.truncate(count);
        sorted
    }

    pub fn touch(&self, key: &str) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(key) {
            entry.accessed_at = now_secs();
            *self.dirty.write() = true;
        }
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        *self.dirty.write() = true;
    }

    fn load(&self) -> Result<()> {
        let data = fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        if data.trim().is_empty() {
            return Ok(());
        }

        match sonic_rs::from_str::<Vec<IndexEntry>>(&data) {
            Ok(entries) => {
                let mut map = HashMap::with_capacity(entries.len());
                for entry in entries {
                    map.insert(entry.key.clone(), entry);
                }
                *self.entries.write() = map;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "index corrupt, starting fresh");
                Ok(())
            }
        }
    }

    /// # Errors
    /// Returns an error if serialization or the atomic rename fails.
    pub fn flush(&self) -> Result<()> {
        if !*self.dirty.read() {
            return Ok(());
        }

        let entries: Vec<IndexEntry> = self.entries.read().values().cloned().collect();
        let json = to_json_pretty(&entries)?;

        let temp_path = self.path.with_extension("tmp");
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        fs::write(&temp_path, json.as_bytes()).map_err(|e| io_err(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| io_err(&self.path, e))?;

        *self.dirty.write() = false;
        Ok(())
    }

    /// # Errors
    /// Returns an error if serialization fails.
    pub fn export_json(&self) -> Result<String> {
        let entries: Vec<IndexEntry> = self.entries.read().values().cloned().collect();
        to_json_pretty(&entries)
    }
}

impl Drop for CacheIndex {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn create_entry(
    key: String,
    entry_type: CacheEntryType,
    size: u64,
    original_size: u64,
    compressed: bool,
    ttl: Duration,
    path: String,
    metadata: String,
) -> IndexEntry {
    let now = now_secs();
    IndexEntry {
        key,
        entry_type: entry_type.as_u8(),
        size,
        original_size,
        compressed,
        created_at: now,
        accessed_at: now,
        ttl_secs: ttl.as_secs(),
        path,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_basic_operations() {
        let dir = tempfile::tempdir().unwrap();
        let index = CacheIndex::open(dir.path().join("index.json")).unwrap();

        let entry = create_entry(
            "test-key".to_string(),
            CacheEntryType::UniverseSnapshot,
            1000,
            2000,
            true,
            Duration::from_secs(3600),
            "universe/test".to_string(),
            "{}".to_string(),
        );

        index.insert(entry);
        assert!(index.contains("test-key"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("test-key").unwrap().size, 1000);

        index.remove("test-key");
        assert!(!index.contains("test-key"));
    }

    #[test]
    fn index_expiration() {
        let entry = IndexEntry {
            key: "expired".to_string(),
            entry_type: 0,
            size: 100,
            original_size: 100,
            compressed: false,
            created_at: 0,
            accessed_at: 0,
            ttl_secs: 1,
            path: "test".to_string(),
            metadata: "{}".to_string(),
        };
        assert!(entry.is_expired());
    }

    #[test]
    fn index_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        {
            let index = CacheIndex::open(path.clone()).unwrap();
            index.insert(create_entry(
                "persist-key".to_string(),
                CacheEntryType::PlanArtifact,
                500,
                500,
                false,
                Duration::from_secs(3600),
                "plans/test".to_string(),
                r#"{"test": true}"#.to_string(),
            ));
            index.flush().unwrap();
            assert!(path.exists());
        }

        {
            let index = CacheIndex::open(path).unwrap();
            assert!(index.contains("persist-key"));
            let entry = index.get("persist-key").unwrap();
            assert_eq!(entry.size, 500);
            assert_eq!(entry.metadata, r#"{"test": true}"#);
        }
    }

    #[test]
    fn index_find_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let index = CacheIndex::open(dir.path().join("index.json")).unwrap();

        index.insert(create_entry(
            "snap1".to_string(),
            CacheEntryType::UniverseSnapshot,
            100,
            100,
            false,
            Duration::from_secs(3600),
            "universe/snap1".to_string(),
            "{}".to_string(),
        ));
        index.insert(create_entry(
            "plan1".to_string(),
            CacheEntryType::PlanArtifact,
            50,
            50,
            false,
            Duration::from_secs(3600),
            "plans/plan1".to_string(),
            "{}".to_string(),
        ));

        assert_eq!(index.find_by_type(CacheEntryType::UniverseSnapshot).len(), 1);
        assert_eq!(index.find_by_type(CacheEntryType::PlanArtifact).len(), 1);
    }

    #[test]
    fn index_find_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let index = CacheIndex::open(dir.path().join("index.json")).unwrap();

        let mut entry1 = create_entry(
            "old".to_string(),
            CacheEntryType::UniverseSnapshot,
            100,
            100,
            false,
            Duration::from_secs(3600),
            "universe/old".to_string(),
            "{}".to_string(),
        );
        entry1.accessed_at = 1000;

        let mut entry2 = create_entry(
            "new".to_string(),
            CacheEntryType::UniverseSnapshot,
            100,
            100,
            false,
            Duration::from_secs(3600),
            "universe/new".to_string(),
            "{}".to_string(),
        );
        entry2.accessed_at = 2000;

        index.insert(entry1);
        index.insert(entry2);

        let oldest = index.find_oldest(1);
        assert_eq!(oldest.len(), 1);
        assert_eq!(oldest[0].key, "old");
    }
}
