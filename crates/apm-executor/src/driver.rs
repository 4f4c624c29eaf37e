//! The Execution Driver (C6): consumes a frozen `ChangeSet`, fetches
//! archives on a bounded worker pool, hands control to the backend for
//! installation, then commits marks (§4.6).

use crate::backend::ExecutorBackend;
use crate::lock::ExecutionLock;
use crate::progress::{ProgressEvent, ProgressObserver, ThrottleMap};
use apm_core::{Context, Error, Result};
use apm_planner::ChangeSet;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info_span, warn};

/// Drives one plan to completion against a given backend.
pub struct ExecutionDriver<'a> {
    backend: &'a dyn ExecutorBackend,
    lock: &'a dyn ExecutionLock,
    observer: &'a dyn ProgressObserver,
}

impl<'a> ExecutionDriver<'a> {
    #[must_use]
    pub fn new(
        backend: &'a dyn ExecutorBackend,
        lock: &'a dyn ExecutionLock,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            backend,
            lock,
            observer,
        }
    }

    /// Executes `plan`'s implied package-state transitions.
    ///
    /// # Errors
    /// `Cancelled` if the context's token fires at a suspension point;
    /// `DownloadFailed` if an archive never arrives; `InstallFailed` or
    /// `OperationFailed` if the backend rejects the install or mark
    /// commit.
    pub async fn apply(&self, plan: &ChangeSet, ctx: &Context) -> Result<()> {
        let span = info_span!("execution_driver.apply");
        let _guard = span.enter();

        let to_fetch: Vec<&str> = plan
            .new_installed
            .iter()
            .chain(plan.upgraded.iter())
            .chain(plan.reinstalled.iter())
            .map(String::as_str)
            .collect();

        let fetched = self.download_phase(&to_fetch, ctx).await?;

        self.install_phase(&fetched, &plan.removed, ctx).await?;

        self.backend.update_marks(plan).await.map_err(|e| {
            warn!(error = %e, "failed to update package marks");
            Error::install_failed(format!("Failed to update package marks: {e}"))
        })?;

        Ok(())
    }

    /// Fetches every package in `packages`, returning the archive paths
    /// the backend reported for each. Concurrency is bounded by
    /// `ctx.worker_pool_size`.
    async fn download_phase(
        &self,
        packages: &[&str],
        ctx: &Context,
    ) -> Result<DashMap<String, PathBuf>> {
        let fetched = DashMap::new();

        if packages.is_empty() {
            self.observer.on_event(ProgressEvent::DownloadComplete);
            return Ok(fetched);
        }

        ctx.check_cancelled()?;

        let throttle = Arc::new(ThrottleMap::new());
        let pool_size = ctx.worker_pool_size.max(1) as usize;

        let results: Vec<Result<(String, PathBuf)>> = stream::iter(packages.iter().copied())
            .map(|package| {
                let throttle = Arc::clone(&throttle);
                async move {
                    ctx.check_cancelled()?;
                    let name = package.to_string();
                    let observer = self.observer;
                    let on_progress = move |current: u64, total: u64| {
                        let percent = percent_of(current, total);
                        if throttle.should_emit(&name, percent) {
                            observer.on_event(ProgressEvent::DownloadProgress {
                                package: name.clone(),
                                current,
                                total,
                            });
                        }
                    };
                    let path = self.backend.archive_fetch(package, &on_progress).await?;
                    Ok((package.to_string(), path))
                }
            })
            .buffer_unordered(pool_size)
            .collect()
            .await;

        for result in results {
            let (package, path) = result?;
            fetched.insert(package, path);
        }

        self.observer.on_event(ProgressEvent::DownloadComplete);
        Ok(fetched)
    }

    async fn install_phase(
        &self,
        fetched: &DashMap<String, PathBuf>,
        to_remove: &[String],
        ctx: &Context,
    ) -> Result<()> {
        ctx.check_cancelled()?;
        self.lock.release().await?;

        let outcome = self.run_installs_and_removals(fetched, to_remove).await;

        self.lock.reacquire().await?;

        outcome
    }

    async fn run_installs_and_removals(
        &self,
        fetched: &DashMap<String, PathBuf>,
        to_remove: &[String],
    ) -> Result<()> {
        let throttle = ThrottleMap::new();

        for entry in fetched.iter() {
            let package = entry.key().clone();
            let archive = entry.value().clone();
            let on_progress = |current: u64, total: u64| {
                let percent = percent_of(current, total);
                if throttle.should_emit(&package, percent) {
                    self.observer.on_event(ProgressEvent::InstallProgress {
                        package: package.clone(),
                        percent,
                    });
                }
                if percent == 100 {
                    self.observer.on_event(ProgressEvent::InstallDone {
                        package: package.clone(),
                    });
                }
            };
            self.backend
                .install_fetched(&package, &archive, &on_progress)
                .await?;
        }

        for package in to_remove {
            let on_progress = |current: u64, total: u64| {
                let percent = percent_of(current, total);
                if throttle.should_emit(package, percent) {
                    self.observer.on_event(ProgressEvent::InstallProgress {
                        package: package.clone(),
                        percent,
                    });
                }
                if percent == 100 {
                    self.observer.on_event(ProgressEvent::InstallDone {
                        package: package.clone(),
                    });
                }
            };
            self.backend.remove_installed(package, &on_progress).await?;
        }

        Ok(())
    }
}

fn percent_of(current: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((current.min(total) * 100) / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::lock::NoopLock;
    use crate::progress::NullObserver;

    #[tokio::test]
    async fn apply_installs_downloads_and_commits_marks() {
        let backend = MemoryBackend::new();
        let lock = NoopLock;
        let observer = NullObserver;
        let driver = ExecutionDriver::new(&backend, &lock, &observer);
        let ctx = Context::new("/tmp/apm-driver-test");

        let plan = ChangeSet {
            new_installed: vec!["vim".to_string()],
            ..Default::default()
        };

        driver.apply(&plan, &ctx).await.unwrap();
        assert_eq!(backend.installed_packages(), vec!["vim"]);
        assert!(backend.marks_were_updated());
    }

    #[tokio::test]
    async fn apply_propagates_download_failure() {
        let backend = MemoryBackend::new().failing("vim");
        let lock = NoopLock;
        let observer = NullObserver;
        let driver = ExecutionDriver::new(&backend, &lock, &observer);
        let ctx = Context::new("/tmp/apm-driver-test-fail");

        let plan = ChangeSet {
            new_installed: vec!["vim".to_string()],
            ..Default::default()
        };

        let err = driver.apply(&plan, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("simulated fetch failure"));
    }

    #[tokio::test]
    async fn apply_with_no_changes_still_completes() {
        let backend = MemoryBackend::new();
        let lock = NoopLock;
        let observer = NullObserver;
        let driver = ExecutionDriver::new(&backend, &lock, &observer);
        let ctx = Context::new("/tmp/apm-driver-test-empty");

        let plan = ChangeSet::default();
        driver.apply(&plan, &ctx).await.unwrap();
        assert!(backend.marks_were_updated());
    }
}
