//! `HttpExecutorBackend`: the production `ExecutorBackend` that fetches
//! archives over HTTP and hands installation off to an external backend
//! command (a "suspension point... external shell invocation" per §5).

use crate::backend::{ExecutorBackend, ProgressFn};
use crate::client::HttpClient;
use crate::config::ExecutorConfig;
use crate::download::download_one;
use crate::retry::with_mirrors;
use crate::source::ArchiveSource;
use crate::throttle::BandwidthThrottler;
use apm_core::{Error, Result};
use apm_planner::ChangeSet;
use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Resolves a package name to where its archive lives. Implemented by the
/// package index/universe backend; kept separate from `ExecutorBackend`
/// so the HTTP fetch machinery doesn't need to know how the index is
/// stored.
pub trait ArchiveLocator: Send + Sync {
    /// # Errors
    /// Returns `Error::package_not_found` if `package` has no known
    /// archive source.
    fn locate(&self, package: &str) -> Result<ArchiveSource>;
}

/// Runs an external command to materialize or remove a fetched archive;
/// the concrete package backend (dpkg, rpm, or a shell script) sits
/// behind this trait.
pub trait ShellBackend: Send + Sync {
    /// # Errors
    /// Returns `Error::install_failed` with the command's captured
    /// stderr on non-zero exit.
    fn install(&self, package: &str, archive: &Path) -> Result<()>;

    /// # Errors
    /// Returns `Error::install_failed` with the command's captured
    /// stderr on non-zero exit.
    fn remove(&self, package: &str) -> Result<()>;

    /// # Errors
    /// Returns `Error::operation_failed` on failure.
    fn commit_marks(&self, change_set: &ChangeSet) -> Result<()>;
}

/// HTTP-backed `ExecutorBackend`: `archive_fetch` is genuinely
/// implemented here (adapting the download/client/retry/throttle/
/// checksum machinery); `install_fetched`/`remove_installed`/
/// `update_marks` delegate to an injected `ShellBackend`.
pub struct HttpExecutorBackend {
    client: HttpClient,
    throttler: BandwidthThrottler,
    config: ExecutorConfig,
    scratch_dir: PathBuf,
    locator: Box<dyn ArchiveLocator>,
    shell: Box<dyn ShellBackend>,
}

impl HttpExecutorBackend {
    /// # Errors
    /// Returns `Error::download_failed` if the HTTP client cannot be
    /// built from `config`.
    pub fn new(
        config: ExecutorConfig,
        scratch_dir: impl Into<PathBuf>,
        locator: Box<dyn ArchiveLocator>,
        shell: Box<dyn ShellBackend>,
    ) -> Result<Self> {
        let throttler = BandwidthThrottler::from_config(&config);
        let client = HttpClient::new(config.clone())?;
        Ok(Self {
            client,
            throttler,
            config,
            scratch_dir: scratch_dir.into(),
            locator,
            shell,
        })
    }
}

#[async_trait]
impl ExecutorBackend for HttpExecutorBackend {
    async fn archive_fetch(&self, package: &str, on_progress: &ProgressFn<'_>) -> Result<PathBuf> {
        let source = self.locator.locate(package)?;
        let dest = self.scratch_dir.join(&source.dest_name);
        let verify = self.config.verify_checksums;

        with_mirrors(&source.primary, &source.fallbacks, &self.config.retry, |url| {
            let source = &source;
            let dest = &dest;
            Box::pin(async move {
                download_one(
                    &self.client,
                    &self.throttler,
                    url,
                    source,
                    dest,
                    verify,
                    on_progress,
                )
                .await
                .map(|fetched| fetched.path)
            }) as Pin<Box<dyn Future<Output = Result<PathBuf>> + Send + '_>>
        })
        .await
    }

    async fn install_fetched(
        &self,
        package: &str,
        archive: &Path,
        on_progress: &ProgressFn<'_>,
    ) -> Result<()> {
        on_progress(0, 100);
        let result = self.shell.install(package, archive);
        on_progress(100, 100);
        result
    }

    async fn remove_installed(&self, package: &str, on_progress: &ProgressFn<'_>) -> Result<()> {
        on_progress(0, 100);
        let result = self.shell.remove(package);
        on_progress(100, 100);
        result
    }

    async fn update_marks(&self, change_set: &ChangeSet) -> Result<()> {
        self.shell
            .commit_marks(change_set)
            .map_err(|e| Error::operation_failed(e.to_string()))
    }
}
