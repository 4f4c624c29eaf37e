//! A minimal view of the process-wide Lock Guard (C8) that the Execution
//! Driver needs: release it before handing control to the backend
//! install step, and reacquire it afterward (§4.6 phase 2: "Release the
//! system-wide backend lock if held... Re-acquire the lock on any
//! failure before propagating it").
//!
//! Defined here rather than depending on `apm-lock` directly so this
//! crate has no build-order dependency on it; `apm-lock`'s `LockGuard`
//! implements this trait.

use apm_core::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ExecutionLock: Send + Sync {
    /// Releases the lock, if held. Idempotent.
    async fn release(&self) -> Result<()>;

    /// Reacquires the lock, using the same timeout it was originally
    /// configured with.
    ///
    /// # Errors
    /// Returns `Error::lock_failed` if another process holds it.
    async fn reacquire(&self) -> Result<()>;
}

/// A lock stand-in for invocations with no real Lock Guard in scope
/// (tests, and any caller that serializes access some other way).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLock;

#[async_trait]
impl ExecutionLock for NoopLock {
    async fn release(&self) -> Result<()> {
        Ok(())
    }

    async fn reacquire(&self) -> Result<()> {
        Ok(())
    }
}
