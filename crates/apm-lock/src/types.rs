//! `probe()`'s result type (§4.8).

use std::path::PathBuf;

/// Non-blocking snapshot of a lock file's state, returned by [`crate::probe`]
/// so a caller can surface `Locked(status)` instead of blocking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockStatus {
    pub locked: bool,
    pub can_acquire: bool,
    pub holder_pid: Option<u32>,
    pub holder_name: Option<String>,
    pub lock_file_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl LockStatus {
    #[must_use]
    pub fn free(path: PathBuf) -> Self {
        Self {
            locked: false,
            can_acquire: true,
            holder_pid: None,
            holder_name: None,
            lock_file_path: Some(path),
            error: None,
        }
    }

    #[must_use]
    pub fn held(path: PathBuf, holder_pid: Option<u32>, holder_name: Option<String>) -> Self {
        Self {
            locked: true,
            can_acquire: false,
            holder_pid,
            holder_name,
            lock_file_path: Some(path),
            error: None,
        }
    }

    #[must_use]
    pub fn unknown(path: PathBuf, error: String) -> Self {
        Self {
            locked: false,
            can_acquire: false,
            holder_pid: None,
            holder_name: None,
            lock_file_path: Some(path),
            error: Some(error),
        }
    }
}
