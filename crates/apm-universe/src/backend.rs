//! Pluggable backing store for a [`crate::Universe`] (§4.2's "ambient
//! addition"). A production backend reads a local package-index snapshot;
//! tests use [`MemoryBackend`] to assemble a Universe directly from data.

use crate::types::{Package, PackageVersion};
use apm_core::Result;

/// One backend-supplied package, with all of its versions inline. The
/// [`Universe`](crate::Universe) builds its arena and indices from a
/// sequence of these; insertion order becomes the Universe's iteration
/// order (§4.2's determinism invariant).
#[derive(Debug, Clone)]
pub struct PackageSnapshot {
    /// The package identity and flags, versions left empty — filled in by
    /// the Universe as it assigns `VersionId`s.
    pub package: Package,
    /// Versions for this package, in backend order.
    pub versions: Vec<PackageVersion>,
}

/// A source of package data a [`crate::Universe`] can be built from.
///
/// `refresh` is expected to be cheap to call repeatedly: a local-snapshot
/// backend reads its index file; a test backend just clones its fixture.
pub trait UniverseBackend: Send + Sync {
    /// Produce a full snapshot of every known package and its versions.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    fn snapshot(&self) -> Result<Vec<PackageSnapshot>>;
}

/// An in-memory backend for tests: returns a fixed, caller-supplied
/// snapshot on every call.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    snapshot: Vec<PackageSnapshot>,
}

impl MemoryBackend {
    /// Build a backend that always returns `snapshot`.
    #[must_use]
    pub fn new(snapshot: Vec<PackageSnapshot>) -> Self {
        Self { snapshot }
    }
}

impl UniverseBackend for MemoryBackend {
    fn snapshot(&self) -> Result<Vec<PackageSnapshot>> {
        Ok(self.snapshot.clone())
    }
}
