//! Per-image append-only history log (§4.7's ambient storage addition).
//!
//! The whole log is a JSON array rewritten through `AtomicWriter` on every
//! append or update, mirroring the read-modify-write shape of the
//! teacher's `LockfileManager::update`. A torn write is caught by the
//! integrity hash checked inside `AtomicWriter::commit`; a reader that
//! finds a log it cannot parse falls back to the empty log rather than
//! surfacing a corrupt file to the caller.

use crate::atomic::{AtomicReader, AtomicWriter};
use crate::types::ImageHistoryEntry;
use apm_core::Result;
use std::path::PathBuf;
use tracing::warn;

/// Append-only history log for one image, backed by `<store_dir>/<image_name>.history.json`.
#[derive(Debug)]
pub struct HistoryStore {
    store_dir: PathBuf,
}

impl HistoryStore {
    #[must_use]
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
        }
    }

    fn path(&self, image_name: &str) -> PathBuf {
        self.store_dir.join(format!("{image_name}.history.json"))
    }

    /// Reads the full log for `image_name`, or an empty log if none
    /// exists yet or the file is unreadable/corrupt (falls back to the
    /// last verified state per §4.7).
    ///
    /// # Errors
    /// Returns `Error::lock_failed` if the log's lock file cannot be
    /// acquired.
    pub fn read_all(&self, image_name: &str) -> Result<Vec<ImageHistoryEntry>> {
        let path = self.path(image_name);
        let reader = AtomicReader::new(&path)?;
        if !reader.exists() {
            return Ok(Vec::new());
        }

        let content = reader.read_string()?;
        match apm_core::from_json::<Vec<ImageHistoryEntry>>(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(image = image_name, error = %e, "history log unreadable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Returns `(entries[offset..offset+limit], total)` per the Image
    /// Reconciler's `history` API.
    ///
    /// # Errors
    /// Propagates `read_all`'s errors.
    pub fn history(
        &self,
        image_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<ImageHistoryEntry>, usize)> {
        let entries = self.read_all(image_name)?;
        let total = entries.len();
        let page = entries.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    /// Appends `entry`, returning the sequence number it was assigned.
    ///
    /// # Errors
    /// Returns `Error::operation_failed` if the rewritten log cannot be
    /// written atomically.
    pub fn append(&self, image_name: &str, mut entry: ImageHistoryEntry) -> Result<u64> {
        let mut entries = self.read_all(image_name)?;
        let sequence = entries.last().map_or(0, |e| e.sequence + 1);
        entry.sequence = sequence;
        entries.push(entry);
        self.write_all(image_name, &entries)?;
        Ok(sequence)
    }

    /// Looks up a single entry by sequence number, for replaying a past
    /// desired-state snapshot through a rollback.
    ///
    /// # Errors
    /// Propagates `read_all`'s errors.
    pub fn get(&self, image_name: &str, sequence: u64) -> Result<Option<ImageHistoryEntry>> {
        let entries = self.read_all(image_name)?;
        Ok(entries.into_iter().find(|e| e.sequence == sequence))
    }

    /// Rewrites the entry at `sequence` in place (used to record the
    /// outcome of an in-flight apply once execution finishes).
    ///
    /// # Errors
    /// Returns `Error::invalid_parameters` if no entry has that sequence
    /// number; otherwise propagates the underlying write error.
    pub fn update(&self, image_name: &str, sequence: u64, updated: ImageHistoryEntry) -> Result<()> {
        let mut entries = self.read_all(image_name)?;
        let slot = entries
            .iter_mut()
            .find(|e| e.sequence == sequence)
            .ok_or_else(|| {
                apm_core::Error::invalid_parameters(format!(
                    "no history entry {sequence} for image {image_name}"
                ))
            })?;
        *slot = updated;
        self.write_all(image_name, &entries)
    }

    fn write_all(&self, image_name: &str, entries: &[ImageHistoryEntry]) -> Result<()> {
        let path = self.path(image_name);
        let content = apm_core::to_json(&entries)?;
        let mut writer = AtomicWriter::new(&path)?;
        writer.content(content.into_bytes());
        writer.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DesiredState, HistoryOutcome, Operation, ReconcileDelta};
    use tempfile::TempDir;

    fn entry(delta: ReconcileDelta) -> ImageHistoryEntry {
        ImageHistoryEntry::pending(
            0,
            "2026-08-01T00:00:00Z".to_string(),
            Operation::Apply,
            DesiredState::default(),
            delta,
        )
    }

    #[test]
    fn append_assigns_increasing_sequence_numbers() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());

        let first = store.append("web", entry(ReconcileDelta::default())).unwrap();
        let second = store.append("web", entry(ReconcileDelta::default())).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);

        let (entries, total) = store.history("web", 0, 10).unwrap();
        assert_eq!(total, 2);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn history_is_paginated() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());
        for _ in 0..5 {
            store.append("web", entry(ReconcileDelta::default())).unwrap();
        }

        let (page, total) = store.history("web", 2, 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].sequence, 2);
    }

    #[test]
    fn update_rewrites_outcome_in_place() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());
        let seq = store.append("web", entry(ReconcileDelta::default())).unwrap();

        let mut updated = entry(ReconcileDelta::default());
        updated.sequence = seq;
        updated.outcome = HistoryOutcome::Succeeded;
        store.update("web", seq, updated).unwrap();

        let (entries, _) = store.history("web", 0, 10).unwrap();
        assert_eq!(entries[0].outcome, HistoryOutcome::Succeeded);
    }

    #[test]
    fn get_finds_entry_by_sequence_and_none_past_the_end() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());
        let seq = store.append("web", entry(ReconcileDelta::default())).unwrap();

        assert_eq!(store.get("web", seq).unwrap().unwrap().sequence, seq);
        assert!(store.get("web", seq + 1).unwrap().is_none());
    }

    #[test]
    fn reading_an_unknown_image_returns_empty_log() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path());
        let (entries, total) = store.history("never-seen", 0, 10).unwrap();
        assert!(entries.is_empty());
        assert_eq!(total, 0);
    }
}
