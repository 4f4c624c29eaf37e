//! Package, version, and dependency-relation types that make up one
//! Universe snapshot.

use apm_core::{Op, RequirementSpec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena handle for a [`Package`]. Stable for the lifetime of one
/// [`crate::Universe`] instance; never reused across a `refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId(pub u32);

/// Arena handle for a specific [`PackageVersion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(pub u32);

/// A single requirement inside a dependency relation: a target name plus
/// an optional operator/version pair, matching §4.1's Requirement Spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// The target package or virtual name.
    pub target: String,
    /// Comparison operator, if a version constraint is present.
    pub op: Option<Op>,
    /// Required version, if a constraint is present.
    pub version: Option<String>,
}

impl Requirement {
    /// A requirement with no version constraint.
    #[must_use]
    pub fn any(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            op: None,
            version: None,
        }
    }

    /// Does `candidate_version` (belonging to the named package or one of
    /// its provides) satisfy this requirement?
    #[must_use]
    pub fn matches(&self, candidate_version: &str) -> bool {
        match (&self.op, &self.version) {
            (Some(op), Some(version)) => apm_core::compare(candidate_version, *op, version),
            _ => true,
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.op, &self.version) {
            (Some(op), Some(version)) => write!(f, "{} {op} {version}", self.target),
            _ => write!(f, "{}", self.target),
        }
    }
}

impl From<&RequirementSpec> for Requirement {
    fn from(spec: &RequirementSpec) -> Self {
        Self {
            target: spec.name().to_string(),
            op: spec.op(),
            version: spec.version().map(ToString::to_string),
        }
    }
}

/// An ordered group of alternative requirements; satisfying any one member
/// satisfies the whole group (§9's "OR-groups and alternatives").
pub type OrGroup = Vec<Requirement>;

/// A virtual name exposed by a version, with an optional version string
/// used when matching a versioned requirement against the provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provide {
    /// The virtual name.
    pub name: String,
    /// Version carried by the provide, if any.
    pub version: Option<String>,
}

/// Critical and non-critical dependency relations carried by one version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relations {
    /// Critical: must be satisfied or the package is broken.
    pub depends: Vec<OrGroup>,
    /// Critical, evaluated before `depends` by backends that care about
    /// ordering; treated identically to `depends` by the planner.
    pub pre_depends: Vec<OrGroup>,
    /// Pairwise exclusions.
    pub conflicts: Vec<Requirement>,
    /// Non-critical, never pulled in automatically.
    pub recommends: Vec<OrGroup>,
    /// Non-critical, never pulled in automatically.
    pub suggests: Vec<OrGroup>,
}

impl Relations {
    /// Iterate over the critical dependency groups (Depends then
    /// PreDepends), in the order step 7 of the planner scans them.
    pub fn critical_groups(&self) -> impl Iterator<Item = &OrGroup> {
        self.depends.iter().chain(self.pre_depends.iter())
    }
}

/// One installable version of a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageVersion {
    /// Owning package.
    pub package: PackageId,
    /// Version string, compared via `apm_core::compare_versions`.
    pub version: String,
    /// Size of the archive to download, in bytes.
    pub download_size: u64,
    /// Size once unpacked/installed, in bytes.
    pub installed_size: u64,
    /// Target architecture, e.g. `x86_64` or `noarch`.
    pub architecture: String,
    /// Whether the backend can currently fetch this version's archive.
    pub downloadable: bool,
    /// Virtual names this version exposes.
    pub provides: Vec<Provide>,
    /// Dependency relations.
    pub relations: Relations,
    /// Backend section, used by `score_sort`.
    pub section: String,
    /// Backend priority, used by `score_sort` (higher sorts first).
    pub priority: i32,
}

/// A package known to the Universe: its identity, flags, and the versions
/// available for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    /// Canonical name.
    pub name: String,
    /// Unremovable per the backend.
    pub essential: bool,
    /// Whether the current installation was pulled in automatically
    /// rather than requested by name; persisted on disk by the backend.
    pub auto_installed: bool,
    /// Currently installed version, if any.
    pub current_version: Option<VersionId>,
    /// All versions known for this package, insertion order preserved.
    pub versions: Vec<VersionId>,
}

impl Package {
    /// Is this package a pure virtual (no real versions, provides-only)?
    #[must_use]
    pub fn is_pure_virtual(&self) -> bool {
        self.versions.is_empty()
    }
}
