//! Wires `LockGuard` into the Execution Driver's `ExecutionLock` seam
//! (§4.6 phase 2: release the backend lock before an install step,
//! reacquire it afterward).
//!
//! `LockGuard::release`/`reacquire` are short, bounded OS lock calls
//! (a poll loop capped at the guard's construction-time timeout), not
//! long-running I/O, so they're called directly rather than dispatched
//! through `spawn_blocking`.

use crate::guard::LockGuard;
use apm_core::Result;
use apm_executor::ExecutionLock;
use async_trait::async_trait;

#[async_trait]
impl ExecutionLock for LockGuard {
    async fn release(&self) -> Result<()> {
        LockGuard::release(self)
    }

    async fn reacquire(&self) -> Result<()> {
        LockGuard::reacquire(self)
    }
}
