//! The Lock & Concurrency Guard (C8): a process-wide exclusive
//! acquisition wrapping every planning/execution entry point, plus a
//! non-blocking `probe` so a caller can surface contention instead of
//! waiting on it.
//!
//! ```no_run
//! use apm_lock::{probe, LockGuard};
//! use std::time::Duration;
//!
//! let status = probe("/var/lib/apm/apm.lck")?;
//! if !status.can_acquire {
//!     println!("locked by pid {:?}", status.holder_pid);
//! }
//!
//! let guard = LockGuard::acquire("/var/lib/apm/apm.lck", Duration::from_secs(30))?;
//! // ... planner/executor entry point runs while `guard` is held ...
//! drop(guard);
//! # Ok::<(), apm_core::Error>(())
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod execution;
mod guard;
mod types;

pub use guard::{probe, LockGuard};
pub use types::LockStatus;
