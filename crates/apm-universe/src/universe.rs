//! The Universe: an arena-of-handles snapshot of every package, version,
//! and provide known at the start of a planning call (§3, §4.2, §9).

use crate::backend::UniverseBackend;
use crate::types::{Package, PackageVersion, PackageId, Requirement, VersionId};
use ahash::AHashMap;
use apm_core::Result;
use std::sync::Arc;
use std::sync::RwLock;

/// One immutable Universe snapshot: the package/version arenas plus the
/// name and provide indices built over them.
///
/// Handles (`PackageId`/`VersionId`) are stable for the lifetime of a
/// `UniverseData` instance but are not meaningful across a `refresh` — a
/// rebuilt Universe may assign different ids to the same name.
#[derive(Debug, Default)]
pub struct UniverseData {
    packages: Vec<Package>,
    versions: Vec<PackageVersion>,
    by_name: AHashMap<String, PackageId>,
    provides: AHashMap<String, Vec<(PackageId, VersionId)>>,
}

impl UniverseData {
    fn build(snapshots: Vec<crate::backend::PackageSnapshot>) -> Self {
        let mut data = Self {
            packages: Vec::with_capacity(snapshots.len()),
            versions: Vec::new(),
            by_name: AHashMap::default(),
            provides: AHashMap::default(),
        };

        for snap in snapshots {
            let package_id = PackageId(u32::try_from(data.packages.len()).unwrap_or(u32::MAX));
            let mut package = snap.package;
            package.versions.clear();

            for mut version in snap.versions {
                let version_id = VersionId(u32::try_from(data.versions.len()).unwrap_or(u32::MAX));
                version.package = package_id;
                for provide in &version.provides {
                    data.provides
                        .entry(provide.name.clone())
                        .or_default()
                        .push((package_id, version_id));
                }
                package.versions.push(version_id);
                data.versions.push(version);
            }

            data.by_name.insert(package.name.clone(), package_id);
            data.packages.push(package);
        }

        data
    }

    /// Exact lookup by canonical name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PackageId> {
        self.by_name.get(name).copied()
    }

    /// Every installed-or-candidate `(package, version)` whose provides
    /// list contains `name`, optionally filtered by a version constraint
    /// on the provide.
    #[must_use]
    pub fn resolve_virtual(
        &self,
        name: &str,
        version_req: Option<&Requirement>,
    ) -> Vec<(PackageId, VersionId)> {
        let Some(candidates) = self.provides.get(name) else {
            return Vec::new();
        };

        candidates
            .iter()
            .copied()
            .filter(|(_, version_id)| {
                let Some(req) = version_req else { return true };
                let version = self.version(*version_id);
                version
                    .provides
                    .iter()
                    .find(|p| p.name == name)
                    .is_some_and(|p| match &p.version {
                        Some(v) => req.matches(v),
                        None => true,
                    })
            })
            .collect()
    }

    /// Look up a package by its handle.
    ///
    /// # Panics
    /// Panics if `id` is not a handle returned by this same snapshot.
    #[must_use]
    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0 as usize]
    }

    /// Look up a version by its handle.
    ///
    /// # Panics
    /// Panics if `id` is not a handle returned by this same snapshot.
    #[must_use]
    pub fn version(&self, id: VersionId) -> &PackageVersion {
        &self.versions[id.0 as usize]
    }

    /// Iterate every package, in backend insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.packages
            .iter()
            .enumerate()
            .map(|(i, p)| (PackageId(u32::try_from(i).unwrap_or(u32::MAX)), p))
    }

    /// Total package count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the Universe holds no packages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// A Universe backed by a pluggable [`UniverseBackend`]. `refresh` rebuilds
/// the arena off to the side and only then swaps it in, so a failed
/// refresh leaves the previous snapshot valid (§4.2's atomicity
/// invariant).
pub struct Universe<B: UniverseBackend> {
    backend: Arc<B>,
    data: RwLock<Arc<UniverseData>>,
}

impl<B: UniverseBackend> std::fmt::Debug for Universe<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.view().len();
        f.debug_struct("Universe")
            .field("package_count", &len)
            .finish_non_exhaustive()
    }
}

impl<B: UniverseBackend> Universe<B> {
    /// Opens a Universe, performing the first `refresh` immediately.
    ///
    /// # Errors
    /// Returns an error if the initial snapshot cannot be read.
    pub fn open(backend: B) -> Result<Self> {
        let backend = Arc::new(backend);
        let data = UniverseData::build(backend.snapshot()?);
        Ok(Self {
            backend,
            data: RwLock::new(Arc::new(data)),
        })
    }

    /// Rebuilds the Universe from the backing store. Atomic: the previous
    /// snapshot remains visible to concurrent readers until the new one is
    /// fully built, and remains valid if this call errors.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    pub fn refresh(&self) -> Result<()> {
        let rebuilt = UniverseData::build(self.backend.snapshot()?);
        *self.data.write().unwrap_or_else(std::sync::PoisonError::into_inner) = Arc::new(rebuilt);
        Ok(())
    }

    /// A cheap, shareable handle to the current snapshot.
    #[must_use]
    pub fn view(&self) -> Arc<UniverseData> {
        Arc::clone(&self.data.read().unwrap_or_else(std::sync::PoisonError::into_inner))
    }
}
