//! The Image Reconciler (C7): diffs a desired package set against the
//! currently installed one, feeds the resulting `(install, remove)` pair
//! into the Planner, and records every attempt in a crash-safe,
//! append-only history log.
//!
//! # Example
//!
//! ```no_run
//! use apm_image::{ChangeApplier, DesiredState, ImageReconciler, PackageSpec, ReconcileDelta};
//! use apm_core::Result;
//! use apm_planner::ChangeSet;
//!
//! struct NoopApplier;
//! impl ChangeApplier for NoopApplier {
//!     fn apply(&self, _delta: &ReconcileDelta) -> Result<ChangeSet> {
//!         Ok(ChangeSet::default())
//!     }
//! }
//!
//! # fn example() -> Result<()> {
//! let applier = NoopApplier;
//! let reconciler = ImageReconciler::new("/var/lib/apm/images", &applier);
//! let desired = DesiredState {
//!     packages: vec![PackageSpec::new("vim")],
//!     ..Default::default()
//! };
//! reconciler.apply_desired("web", &desired, &[])?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod atomic;
mod config;
mod diff;
mod hash;
mod history;
mod reconciler;
mod types;

pub use atomic::{recover, AtomicReader, AtomicWriter, RecoveryResult, WriteResult};
pub use config::ConfigStore;
pub use diff::reconcile;
pub use hash::{bytes_to_hex, IntegrityHasher};
pub use history::HistoryStore;
pub use reconciler::{ChangeApplier, ImageReconciler};
pub use types::{
    DesiredState, Hooks, HistoryOutcome, ImageHistoryEntry, Operation, PackageSpec, ReconcileDelta,
};
