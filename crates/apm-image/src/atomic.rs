//! Crash-safe file writes: exclusive lock on a sibling `.lck` file, write
//! to a temp file, verify its integrity hash, then atomically rename it
//! onto the target (§4.7's "lock-then-temp-file-then-atomic-rename").

use crate::hash::IntegrityHasher;
use apm_core::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const TEMP_SUFFIX: &str = "tmp";
const LOCK_SUFFIX: &str = "lck";

fn io_err(path: &Path, err: std::io::Error) -> Error {
    Error::operation_failed(format!("io error at {}: {err}", path.display()))
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|n| format!("{}.{suffix}", n.to_string_lossy()))
        .unwrap_or_else(|| suffix.to_string());
    target.with_file_name(file_name)
}

/// Atomic writer holding the exclusive lock for the duration of one
/// write. Dropping it without calling `commit` cleans up any orphaned
/// temp file and releases the lock.
#[derive(Debug)]
pub struct AtomicWriter {
    target: PathBuf,
    temp_path: PathBuf,
    _lock_file: File,
    content: Option<Vec<u8>>,
}

impl AtomicWriter {
    /// # Errors
    /// Returns `Error::lock_failed` if the exclusive lock cannot be
    /// acquired within the bounded timeout.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let target = path.as_ref().to_path_buf();
        let lock_file_path = sibling(&target, LOCK_SUFFIX);
        let temp_path = sibling(&target, TEMP_SUFFIX);

        debug!(target = %target.display(), "creating atomic writer");
        let lock_file = acquire_lock(&lock_file_path)?;

        Ok(Self {
            target,
            temp_path,
            _lock_file: lock_file,
            content: None,
        })
    }

    pub fn content(&mut self, content: impl Into<Vec<u8>>) -> &mut Self {
        self.content = Some(content.into());
        self
    }

    /// # Errors
    /// Returns `Error::operation_failed` if any stage of the write fails
    /// or the temp file's hash doesn't match what was written.
    pub fn commit(mut self) -> Result<WriteResult> {
        let content = self.content.take().ok_or_else(|| {
            Error::operation_failed("no content provided for atomic write".to_string())
        })?;
        let expected_hash = IntegrityHasher::hash_bytes(&content);

        if let Some(parent) = self.target.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| io_err(&self.target, e))?;
            }
        }

        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.temp_path)
                .map_err(|e| io_err(&self.temp_path, e))?;
            std::io::Write::write_all(&mut temp_file, &content)
                .map_err(|e| io_err(&self.temp_path, e))?;
            temp_file.sync_all().map_err(|e| io_err(&self.temp_path, e))?;
        }

        let actual_hash =
            IntegrityHasher::hash_file(&self.temp_path).map_err(|e| io_err(&self.temp_path, e))?;
        if actual_hash != expected_hash {
            let _ = fs::remove_file(&self.temp_path);
            return Err(Error::operation_failed(format!(
                "integrity check failed writing {}: expected {}, got {}",
                self.target.display(),
                crate::hash::bytes_to_hex(&expected_hash),
                crate::hash::bytes_to_hex(&actual_hash),
            )));
        }
        trace!("temp file integrity verified");

        let had_existing = self.target.exists();
        fs::rename(&self.temp_path, &self.target).map_err(|e| io_err(&self.target, e))?;

        #[cfg(unix)]
        if let Some(parent) = self.target.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        debug!(target = %self.target.display(), "atomic write completed");
        Ok(WriteResult {
            path: self.target.clone(),
            bytes_written: content.len(),
            hash: crate::hash::bytes_to_hex(&expected_hash),
            had_existing,
        })
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if self.temp_path.exists() {
            warn!(temp = %self.temp_path.display(), "cleaning up orphaned temp file");
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Result of a successful atomic write.
#[derive(Debug)]
pub struct WriteResult {
    pub path: PathBuf,
    pub bytes_written: usize,
    pub hash: String,
    pub had_existing: bool,
}

/// Reader paired with `AtomicWriter`; acquires the same lock file
/// (exclusively, since every read in this crate precedes a read-modify-
/// write) before reading the target.
#[derive(Debug)]
pub struct AtomicReader {
    target: PathBuf,
    _lock_file: File,
}

impl AtomicReader {
    /// # Errors
    /// Returns `Error::lock_failed` if the lock cannot be acquired.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let target = path.as_ref().to_path_buf();
        let lock_file_path = sibling(&target, LOCK_SUFFIX);
        let lock_file = acquire_lock(&lock_file_path)?;
        Ok(Self {
            target,
            _lock_file: lock_file,
        })
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.target.exists()
    }

    /// # Errors
    /// Returns `Error::operation_failed` if the file cannot be read or
    /// decoded as UTF-8.
    pub fn read_string(&self) -> Result<String> {
        let mut file = File::open(&self.target).map_err(|e| io_err(&self.target, e))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| io_err(&self.target, e))?;
        Ok(content)
    }
}

fn acquire_lock(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
        }
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| io_err(path, e))?;

    let start = Instant::now();
    let timeout = Duration::from_secs(30);
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!(path = %path.display(), "acquired exclusive lock");
                return Ok(file);
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                if start.elapsed() > timeout {
                    return Err(Error::lock_failed(format!(
                        "failed to acquire lock on {} within {timeout:?}",
                        path.display()
                    )));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(io_err(path, e)),
        }
    }
}

/// Cleans up orphaned temp files left behind by a crashed write.
///
/// # Errors
/// Returns `Error::operation_failed` if the directory cannot be scanned.
pub fn recover(directory: &Path) -> Result<RecoveryResult> {
    let mut result = RecoveryResult::default();
    if !directory.exists() {
        return Ok(result);
    }

    for entry in fs::read_dir(directory).map_err(|e| io_err(directory, e))? {
        let entry = entry.map_err(|e| io_err(directory, e))?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        if name.ends_with(&format!(".{TEMP_SUFFIX}")) {
            debug!(path = %path.display(), "removing orphaned temp file");
            fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
            result.temp_files_cleaned += 1;
        }
    }

    Ok(result)
}

/// Result of a `recover` pass.
#[derive(Debug, Default)]
pub struct RecoveryResult {
    pub temp_files_cleaned: usize,
}
