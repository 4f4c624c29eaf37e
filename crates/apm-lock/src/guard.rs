//! RAII exclusive lock on a sibling `.lck` file (§4.8), adapted from the
//! same `fs2` try-lock-and-poll pattern the Image Reconciler's atomic
//! writer uses for its own lock file.

use crate::types::LockStatus;
use apm_core::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn io_err(path: &Path, err: std::io::Error) -> Error {
    Error::lock_failed(format!("io error at {}: {err}", path.display()))
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
        }
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| io_err(path, e))
}

fn write_holder(path: &Path, file: &mut File, holder_name: Option<&str>) -> Result<()> {
    let content = format!("{}\n{}", std::process::id(), holder_name.unwrap_or(""));
    file.set_len(0).map_err(|e| io_err(path, e))?;
    file.write_all(content.as_bytes()).map_err(|e| io_err(path, e))?;
    file.sync_all().map_err(|e| io_err(path, e))?;
    Ok(())
}

fn read_holder(path: &Path) -> (Option<u32>, Option<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return (None, None);
    };
    let mut lines = content.splitn(2, '\n');
    let pid = lines.next().and_then(|s| s.trim().parse::<u32>().ok());
    let name = lines
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    (pid, name)
}

struct GuardState {
    file: Option<File>,
}

/// An RAII-scoped exclusive lock. The OS advisory lock is released on
/// every exit path, including panics, by `Drop`.
pub struct LockGuard {
    path: PathBuf,
    timeout: Duration,
    holder_name: Option<String>,
    state: Mutex<GuardState>,
}

impl LockGuard {
    /// Blocks (polling every 10ms) until the exclusive lock on `path` is
    /// acquired or `timeout` elapses.
    ///
    /// # Errors
    /// Returns `Error::lock_failed` if the lock is held by another
    /// process past `timeout`.
    pub fn acquire(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        Self::acquire_named(path, timeout, None)
    }

    /// Same as [`Self::acquire`], recording `holder_name` in the lock
    /// file so a concurrent `probe` can report it.
    ///
    /// # Errors
    /// Returns `Error::lock_failed` if the lock is held by another
    /// process past `timeout`.
    pub fn acquire_named(
        path: impl AsRef<Path>,
        timeout: Duration,
        holder_name: Option<String>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = try_lock_with_timeout(&path, timeout)?;
        write_holder(&path, &mut file, holder_name.as_deref())?;
        debug!(path = %path.display(), "acquired process-wide lock");
        Ok(Self {
            path,
            timeout,
            holder_name,
            state: Mutex::new(GuardState { file: Some(file) }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock. Idempotent: calling it on an already-released
    /// guard is a no-op.
    ///
    /// # Errors
    /// Returns `Error::lock_failed` if the OS-level unlock call fails.
    pub fn release(&self) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| Error::lock_failed("lock guard mutex poisoned".to_string()))?;
        if let Some(file) = guard.file.take() {
            FileExt::unlock(&file).map_err(|e| io_err(&self.path, e))?;
            debug!(path = %self.path.display(), "released process-wide lock");
        }
        Ok(())
    }

    /// Reacquires the lock using the same timeout it was constructed
    /// with. A no-op if the lock is already held.
    ///
    /// # Errors
    /// Returns `Error::lock_failed` if another process holds the lock
    /// past the original timeout.
    pub fn reacquire(&self) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| Error::lock_failed("lock guard mutex poisoned".to_string()))?;
        if guard.file.is_some() {
            return Ok(());
        }
        let mut file = try_lock_with_timeout(&self.path, self.timeout)?;
        write_holder(&self.path, &mut file, self.holder_name.as_deref())?;
        debug!(path = %self.path.display(), "reacquired process-wide lock");
        guard.file = Some(file);
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.state.lock() {
            if let Some(file) = guard.file.take() {
                if let Err(e) = FileExt::unlock(&file) {
                    warn!(path = %self.path.display(), error = %e, "failed to release lock on drop");
                }
            }
        }
    }
}

fn try_lock_with_timeout(path: &Path, timeout: Duration) -> Result<File> {
    let file = open_lock_file(path)?;
    let start = Instant::now();
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => return Ok(file),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                if start.elapsed() > timeout {
                    return Err(Error::lock_failed(format!(
                        "failed to acquire lock on {} within {timeout:?}",
                        path.display()
                    )));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(io_err(path, e)),
        }
    }
}

/// Non-blocking check of whether `path`'s lock can be acquired right
/// now, without actually holding it.
///
/// # Errors
/// Returns `Error::lock_failed` only if the lock file itself cannot be
/// opened (e.g. permissions); contention is reported via `LockStatus`,
/// not an error.
pub fn probe(path: impl AsRef<Path>) -> Result<LockStatus> {
    let path = path.as_ref().to_path_buf();
    let file = match open_lock_file(&path) {
        Ok(f) => f,
        Err(e) => return Ok(LockStatus::unknown(path, e.to_string())),
    };

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            Ok(LockStatus::free(path))
        }
        Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
            let (pid, name) = read_holder(&path);
            Ok(LockStatus::held(path, pid, name))
        }
        Err(e) => Ok(LockStatus::unknown(path, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("apm.lck");

        let guard = LockGuard::acquire(&path, Duration::from_millis(200)).unwrap();
        guard.release().unwrap();
        guard.reacquire().unwrap();
        guard.release().unwrap();
    }

    #[test]
    fn release_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("apm.lck");
        let guard = LockGuard::acquire(&path, Duration::from_millis(200)).unwrap();
        guard.release().unwrap();
        guard.release().unwrap();
    }

    #[test]
    fn probe_reports_free_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("apm.lck");
        let status = probe(&path).unwrap();
        assert!(status.can_acquire);
        assert!(!status.locked);
    }

    #[test]
    fn probe_reports_holder_pid_when_contended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("apm.lck");
        let _guard =
            LockGuard::acquire_named(&path, Duration::from_millis(200), Some("apm-install".to_string()))
                .unwrap();

        let status = probe(&path).unwrap();
        assert!(status.locked);
        assert!(!status.can_acquire);
        assert_eq!(status.holder_pid, Some(std::process::id()));
        assert_eq!(status.holder_name.as_deref(), Some("apm-install"));
    }

    #[test]
    fn acquire_times_out_when_already_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("apm.lck");
        let _guard = LockGuard::acquire(&path, Duration::from_secs(30)).unwrap();

        let err = LockGuard::acquire(&path, Duration::from_millis(50)).unwrap_err();
        assert!(err.to_string().contains("failed to acquire lock"));
    }
}
