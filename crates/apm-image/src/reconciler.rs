//! The Image Reconciler (C7): `apply_desired`/`history`/`get_config`/
//! `save_config` (§6).

use crate::config::ConfigStore;
use crate::diff::reconcile;
use crate::history::HistoryStore;
use crate::types::{DesiredState, HistoryOutcome, ImageHistoryEntry, Operation};
use apm_core::Result;
use apm_planner::ChangeSet;
use std::path::PathBuf;

/// Applies a reconciled delta against the live system. Implemented by a
/// facade that drives the Planner's `plan_change` and, if `apply` is
/// requested, the Execution Driver — kept as a trait so this crate
/// doesn't need a direct dependency on `apm-executor` (neither crate
/// touches the other's storage).
pub trait ChangeApplier: Send + Sync {
    /// # Errors
    /// Returns whatever error the planner or execution driver produced;
    /// the reconciler records it in the history entry and leaves the
    /// prior image state unchanged.
    fn apply(&self, delta: &crate::types::ReconcileDelta) -> Result<ChangeSet>;
}

/// Image Reconciler: compares desired vs. actual package sets, persists
/// desired-state configs, and appends a crash-safe history entry around
/// every apply.
pub struct ImageReconciler<'a> {
    history: HistoryStore,
    configs: ConfigStore,
    applier: &'a dyn ChangeApplier,
}

impl<'a> ImageReconciler<'a> {
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>, applier: &'a dyn ChangeApplier) -> Self {
        let state_dir = state_dir.into();
        Self {
            history: HistoryStore::new(state_dir.join("history")),
            configs: ConfigStore::new(state_dir.join("configs")),
            applier,
        }
    }

    /// Reconciles `desired` against `actual`, appends a pending history
    /// entry, executes the delta, then rewrites the entry with the
    /// outcome. On failure, the prior image state is left unchanged: the
    /// only observable effect is the history entry recording the
    /// attempted delta and the error (§4.7). The recorded `Operation` is
    /// classified from the delta's shape (install-only, remove-only,
    /// both, or neither) per [`Operation::classify`].
    ///
    /// # Errors
    /// Returns whatever `ChangeApplier::apply` returned; the history
    /// entry has already recorded the failure before this returns.
    pub fn apply_desired(
        &self,
        image_name: &str,
        desired: &DesiredState,
        actual: &[String],
    ) -> Result<ChangeSet> {
        let delta = reconcile(desired, actual);
        let operation = Operation::classify(&delta);
        self.record_and_apply(image_name, operation, desired, delta)
    }

    /// Replays the desired state saved in a previous history entry
    /// through the same pipeline as [`Self::apply_desired`], recording
    /// the new entry as `Operation::Rollback` regardless of the delta it
    /// computes against the current `actual` set (§4.7: "Rollback is
    /// apply a previous desired-state snapshot through the same
    /// pipeline").
    ///
    /// # Errors
    /// Returns `Error::invalid_parameters` if `sequence` names no entry
    /// in `image_name`'s history; otherwise whatever `ChangeApplier::apply`
    /// returned.
    pub fn rollback_to(
        &self,
        image_name: &str,
        sequence: u64,
        actual: &[String],
    ) -> Result<ChangeSet> {
        let snapshot = self.history.get(image_name, sequence)?.ok_or_else(|| {
            apm_core::Error::invalid_parameters(format!(
                "no history entry {sequence} for image {image_name}"
            ))
        })?;
        let delta = reconcile(&snapshot.desired, actual);
        self.record_and_apply(image_name, Operation::Rollback, &snapshot.desired, delta)
    }

    fn record_and_apply(
        &self,
        image_name: &str,
        operation: Operation,
        desired: &DesiredState,
        delta: crate::types::ReconcileDelta,
    ) -> Result<ChangeSet> {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let pending =
            ImageHistoryEntry::pending(0, timestamp, operation, desired.clone(), delta.clone());
        let sequence = self.history.append(image_name, pending.clone())?;

        let outcome = self.applier.apply(&delta);

        let mut recorded = pending;
        recorded.sequence = sequence;
        match &outcome {
            Ok(_) => recorded.outcome = HistoryOutcome::Succeeded,
            Err(e) => {
                recorded.outcome = HistoryOutcome::Failed;
                recorded.error = Some(e.to_string());
            }
        }
        self.history.update(image_name, sequence, recorded)?;

        outcome
    }

    /// # Errors
    /// Propagates `HistoryStore::history`'s errors.
    pub fn history(
        &self,
        image_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<ImageHistoryEntry>, usize)> {
        self.history.history(image_name, offset, limit)
    }

    /// # Errors
    /// Propagates `ConfigStore::get`'s errors.
    pub fn get_config(&self, image_name: &str) -> Result<DesiredState> {
        self.configs.get(image_name)
    }

    /// # Errors
    /// Propagates `ConfigStore::save`'s errors.
    pub fn save_config(&self, image_name: &str, config: &DesiredState) -> Result<()> {
        self.configs.save(image_name, config)
    }
}
