//! The `ExecutorBackend` capability (§6's "backend capability set
//! consumed": `archive_fetch`, `install_fetched`, `update_marks`) that the
//! Execution Driver calls into. Kept as a trait object so the HTTP-backed
//! production implementation and a deterministic in-memory test double
//! can share one driver.

use apm_planner::ChangeSet;
use apm_core::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Progress callback shape shared by both backend operations:
/// `on_progress(current, total)` for downloads, `on_progress(percent, 100)`
/// for installs.
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// The capability set the Execution Driver consumes from the package
/// backend (§6).
#[async_trait]
pub trait ExecutorBackend: Send + Sync {
    /// Fetches one package's archive into the driver's scratch directory,
    /// reporting byte progress as it streams.
    ///
    /// # Errors
    /// Returns `Error::download_failed` after the bounded retry budget is
    /// exhausted.
    async fn archive_fetch(&self, package: &str, on_progress: &ProgressFn<'_>) -> Result<PathBuf>;

    /// Installs a previously fetched archive, reporting percent progress.
    ///
    /// # Errors
    /// Returns `Error::install_failed` with the backend's accumulated
    /// message (or the fixed fallback if empty).
    async fn install_fetched(
        &self,
        package: &str,
        archive: &Path,
        on_progress: &ProgressFn<'_>,
    ) -> Result<()>;

    /// Removes a package that required no archive.
    ///
    /// # Errors
    /// Returns `Error::install_failed` on backend failure.
    async fn remove_installed(&self, package: &str, on_progress: &ProgressFn<'_>) -> Result<()>;

    /// Commits the mark-state transitions implied by `change_set` to the
    /// backend's persistent store. Called once, last, by phase 3.
    ///
    /// # Errors
    /// Returns `Error::install_failed("Failed to update package marks")`
    /// on backend failure, per §4.6 step 3.
    async fn update_marks(&self, change_set: &ChangeSet) -> Result<()>;
}

/// A deterministic, in-memory `ExecutorBackend` for planner/driver tests:
/// every fetch and install "succeeds" instantly and records what was
/// asked of it, mirroring `apm_universe::MemoryBackend`'s role on the
/// planning side.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    fetched: DashMap<String, PathBuf>,
    installed: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
    marks_updated: Mutex<Option<ChangeSet>>,
    fail_packages: DashMap<String, ()>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation touching `package` fail, to exercise the
    /// Execution Driver's error-propagation paths.
    #[must_use]
    pub fn failing(self, package: impl Into<String>) -> Self {
        self.fail_packages.insert(package.into(), ());
        self
    }

    #[must_use]
    pub fn installed_packages(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }

    #[must_use]
    pub fn removed_packages(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    #[must_use]
    pub fn marks_were_updated(&self) -> bool {
        self.marks_updated.lock().unwrap().is_some()
    }
}

#[async_trait]
impl ExecutorBackend for MemoryBackend {
    async fn archive_fetch(&self, package: &str, on_progress: &ProgressFn<'_>) -> Result<PathBuf> {
        if self.fail_packages.contains_key(package) {
            return Err(apm_core::Error::download_failed(format!(
                "simulated fetch failure for {package}"
            )));
        }
        on_progress(0, 100);
        on_progress(100, 100);
        let path = PathBuf::from(format!("/tmp/apm-memory-backend/{package}.tar.gz"));
        self.fetched.insert(package.to_string(), path.clone());
        Ok(path)
    }

    async fn install_fetched(
        &self,
        package: &str,
        _archive: &Path,
        on_progress: &ProgressFn<'_>,
    ) -> Result<()> {
        if self.fail_packages.contains_key(package) {
            return Err(apm_core::Error::install_failed(format!(
                "simulated install failure for {package}"
            )));
        }
        on_progress(0, 100);
        on_progress(100, 100);
        self.installed.lock().unwrap().push(package.to_string());
        Ok(())
    }

    async fn remove_installed(&self, package: &str, on_progress: &ProgressFn<'_>) -> Result<()> {
        if self.fail_packages.contains_key(package) {
            return Err(apm_core::Error::install_failed(format!(
                "simulated removal failure for {package}"
            )));
        }
        on_progress(0, 100);
        on_progress(100, 100);
        self.removed.lock().unwrap().push(package.to_string());
        Ok(())
    }

    async fn update_marks(&self, change_set: &ChangeSet) -> Result<()> {
        *self.marks_updated.lock().unwrap() = Some(change_set.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_records_fetch_and_install() {
        let backend = MemoryBackend::new();
        let path = backend.archive_fetch("vim", &|_, _| {}).await.unwrap();
        backend
            .install_fetched("vim", &path, &|_, _| {})
            .await
            .unwrap();
        assert_eq!(backend.installed_packages(), vec!["vim"]);
    }

    #[tokio::test]
    async fn memory_backend_can_simulate_failure() {
        let backend = MemoryBackend::new().failing("vim");
        let err = backend.archive_fetch("vim", &|_, _| {}).await.unwrap_err();
        assert!(err.to_string().contains("simulated fetch failure"));
    }
}
