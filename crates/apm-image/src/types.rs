//! Desired-state configs and image history entries (§3, §4.7, §6).

use serde::{Deserialize, Serialize};

/// A single package request inside a desired state: a name plus an
/// optional version pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PackageSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    #[must_use]
    pub fn pinned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }
}

/// The structured document persisted by `save_config`/`get_config`: `{
/// base_image, packages: [ {name, version?} ], commands?, hooks? }` per §6.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
    #[serde(default)]
    pub packages: Vec<PackageSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Hooks>,
}

impl DesiredState {
    /// Desired package names in declaration order, used to compute
    /// `install = desired.names() ∖ actual` while preserving order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Pre/post lifecycle hooks attached to a desired state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_apply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_apply: Option<String>,
}

/// The normalized `(install, remove)` pair produced by reconciliation
/// (§4.7), ready to feed `Planner::plan_change`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileDelta {
    /// Packages to install, in desired-state declaration order, carrying
    /// their version pin where one was given.
    pub install: Vec<PackageSpec>,
    /// Packages to remove, in sorted (deterministic) order.
    pub remove: Vec<String>,
}

impl ReconcileDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.remove.is_empty()
    }
}

/// Outcome recorded against an `ImageHistoryEntry` once execution finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryOutcome {
    /// The entry was appended but execution has not reported back yet.
    Pending,
    Succeeded,
    Failed,
}

/// What kind of reconciliation a history entry records (§3). `Install`,
/// `Remove`, and `Upgrade` classify an ordinary `apply_desired` call by
/// the shape of the delta it computed; `Apply` covers a no-op delta
/// (desired already matches actual); `Rollback` marks a call that
/// replayed a previous desired-state snapshot rather than the image's
/// currently saved one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Install,
    Remove,
    Upgrade,
    Apply,
    Rollback,
}

impl Operation {
    /// Classifies an ordinary (non-rollback) reconciliation by the shape
    /// of its delta: install-only, remove-only, both (an upgrade-shaped
    /// swap), or neither (desired already matches actual).
    #[must_use]
    pub fn classify(delta: &ReconcileDelta) -> Self {
        match (delta.install.is_empty(), delta.remove.is_empty()) {
            (true, true) => Self::Apply,
            (false, true) => Self::Install,
            (true, false) => Self::Remove,
            (false, false) => Self::Upgrade,
        }
    }
}

/// One row of the append-only image history log. The reconciler appends
/// an entry with `outcome: Pending` before executing, then rewrites the
/// same sequence number with the final outcome (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHistoryEntry {
    /// Monotonically increasing sequence number, unique within an image's
    /// history log.
    pub sequence: u64,
    /// RFC 3339 timestamp of when the entry was appended.
    pub timestamp: String,
    /// What kind of reconciliation this entry records.
    pub operation: Operation,
    /// The desired state this entry reconciled against.
    pub desired: DesiredState,
    /// The delta computed from `desired` vs. the actual installed set.
    pub delta: ReconcileDelta,
    pub outcome: HistoryOutcome,
    /// Populated when `outcome == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageHistoryEntry {
    #[must_use]
    pub fn pending(
        sequence: u64,
        timestamp: String,
        operation: Operation,
        desired: DesiredState,
        delta: ReconcileDelta,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            operation,
            desired,
            delta,
            outcome: HistoryOutcome::Pending,
            error: None,
        }
    }
}
