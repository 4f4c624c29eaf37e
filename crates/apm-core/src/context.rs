//! The explicit, per-invocation [`Context`] that replaces ambient global
//! state (design note in SPEC_FULL.md §9): every Planner and Execution
//! Driver call takes one, rather than reaching into process-wide
//! configuration or a shared error accumulator.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cooperative cancellation token checked at every suspension point
/// (`universe.refresh`, archive download, backend install, external shell
/// invocation). Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A token that starts, and remains, uncancelled until [`Self::cancel`]
    /// is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Has cancellation been requested?
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-invocation paths and tunables threaded through every Planner and
/// Execution Driver call. Constructed once per invocation (or reused by a
/// long-lived facade); never read from global mutable state.
#[derive(Debug, Clone)]
pub struct Context {
    /// Root path of the Universe's backing-store snapshot.
    pub universe_store: PathBuf,
    /// Root path of the append-only image-history store.
    pub image_history_dir: PathBuf,
    /// Path to the on-disk process-exclusion lock file.
    pub lock_file_path: PathBuf,
    /// Directory backing the package-index cache (A4).
    pub cache_dir: PathBuf,
    /// Execution Driver download worker-pool size (§5, default 20).
    pub worker_pool_size: u32,
    /// When a virtual install target has multiple providers, prefer the
    /// first rather than erroring (§4.4 step 3.b).
    pub install_virtual_prefers_first: bool,
    /// Default value of `remove_depends` when the caller does not specify
    /// one explicitly.
    pub remove_depends_default: bool,
    /// How long to wait to acquire the process-wide lock before failing
    /// with `LockFailed` (§4.8).
    pub lock_timeout: std::time::Duration,
    /// Cancellation token checked at every suspension point.
    pub cancellation: CancellationToken,
}

impl Context {
    /// Builds a Context from an [`crate::ApplicationConfig`]-shaped set of
    /// paths and tunables rooted at `state_dir`.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            universe_store: state_dir.join("universe"),
            image_history_dir: state_dir.join("images"),
            lock_file_path: state_dir.join("apm.lck"),
            cache_dir: state_dir.join("cache"),
            worker_pool_size: 20,
            install_virtual_prefers_first: false,
            remove_depends_default: false,
            lock_timeout: std::time::Duration::from_secs(30),
            cancellation: CancellationToken::new(),
        }
    }

    /// Returns `Err(Cancelled)` if cancellation has been requested.
    ///
    /// # Errors
    /// Returns `crate::Error::Cancelled` if the token has been cancelled.
    pub fn check_cancelled(&self) -> crate::Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(crate::Error::Cancelled);
        }
        Ok(())
    }
}
