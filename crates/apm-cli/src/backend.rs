//! A JSON-file-backed `UniverseBackend`/`ExecutorBackend` pair: the
//! reference backend this CLI drives the Planner and Execution Driver
//! against, in lieu of a real host/container package database (neither
//! is implemented in this workspace).
//!
//! The catalog file holds every known package and version; which version
//! (if any) is installed is recorded by index, since `VersionId`s are
//! only stable for the lifetime of one `UniverseData` build.

use apm_core::{Error, Result};
use apm_executor::{ExecutorBackend, ProgressFn};
use apm_planner::ChangeSet;
use apm_universe::{PackageSnapshot, UniverseBackend};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One version entry in the on-disk catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogVersion {
    pub version: String,
    #[serde(default)]
    pub download_size: u64,
    #[serde(default)]
    pub installed_size: u64,
    #[serde(default = "default_architecture")]
    pub architecture: String,
    #[serde(default = "default_true")]
    pub downloadable: bool,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub priority: i32,
}

fn default_architecture() -> String {
    "noarch".to_string()
}

fn default_true() -> bool {
    true
}

/// One package entry in the on-disk catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPackage {
    pub name: String,
    #[serde(default)]
    pub essential: bool,
    #[serde(default)]
    pub auto_installed: bool,
    /// Index into `versions` of the currently installed one, if any.
    #[serde(default)]
    pub installed_version: Option<usize>,
    pub versions: Vec<CatalogVersion>,
}

/// The on-disk form of a [`Catalog`]: `{ "packages": [ ... ] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub packages: Vec<CatalogPackage>,
}

fn io_err(path: &Path, err: &std::io::Error) -> Error {
    Error::operation_failed(format!("{}: {err}", path.display()))
}

/// Reads the catalog file at `path`, returning an empty catalog if it
/// doesn't exist yet.
///
/// # Errors
/// Returns `Error::operation_failed` on an I/O failure other than
/// not-found, or an invalid document.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    match std::fs::read(path) {
        Ok(bytes) => apm_core::from_json_slice(&bytes),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Catalog::default()),
        Err(err) => Err(io_err(path, &err)),
    }
}

/// Writes `catalog` to `path`, creating its parent directory if needed.
///
/// # Errors
/// Returns `Error::operation_failed` on an I/O or serialization failure.
pub fn save_catalog(path: &Path, catalog: &Catalog) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(path, &e))?;
    }
    let json = apm_core::to_json_pretty(catalog)?;
    std::fs::write(path, json).map_err(|e| io_err(path, &e))
}

/// A `UniverseBackend` + `ExecutorBackend` pair rooted at a single JSON
/// catalog file, so `install --apply` followed by another invocation sees
/// its own prior effects.
pub struct FileBackend {
    path: PathBuf,
    state: Mutex<Catalog>,
}

impl FileBackend {
    /// Loads the catalog at `path` (or starts empty) and holds it for
    /// both reading (`UniverseBackend::snapshot`) and writing
    /// (`ExecutorBackend::update_marks`).
    ///
    /// # Errors
    /// Propagates [`load_catalog`]'s errors.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = load_catalog(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, catalog: &Catalog) -> Result<()> {
        save_catalog(&self.path, catalog)
    }
}

impl UniverseBackend for FileBackend {
    fn snapshot(&self) -> Result<Vec<PackageSnapshot>> {
        let catalog = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        // `UniverseData::build` assigns each `VersionId` sequentially, in
        // the order snapshots (and each snapshot's versions) are visited,
        // and never recomputes `package.current_version` itself — it
        // trusts whatever the backend already put there. So this is the
        // one place responsible for turning `installed_version`'s
        // per-package index into that same global numbering.
        let mut next_version_id: u32 = 0;
        let snapshots = catalog
            .packages
            .iter()
            .map(|entry| {
                let snapshot = to_snapshot(entry, next_version_id);
                next_version_id += u32::try_from(entry.versions.len()).unwrap_or(u32::MAX);
                snapshot
            })
            .collect();
        Ok(snapshots)
    }
}

fn to_snapshot(entry: &CatalogPackage, version_id_base: u32) -> PackageSnapshot {
    use apm_universe::{Package, PackageId, PackageVersion, Provide, Relations, Requirement, VersionId};

    let versions = entry
        .versions
        .iter()
        .map(|v| PackageVersion {
            package: PackageId(0),
            version: v.version.clone(),
            download_size: v.download_size,
            installed_size: v.installed_size,
            architecture: v.architecture.clone(),
            downloadable: v.downloadable,
            provides: v
                .provides
                .iter()
                .map(|name| Provide {
                    name: name.clone(),
                    version: None,
                })
                .collect(),
            relations: Relations {
                depends: v
                    .depends
                    .iter()
                    .map(|target| vec![Requirement {
                        target: target.clone(),
                        op: None,
                        version: None,
                    }])
                    .collect(),
                ..Relations::default()
            },
            section: v.section.clone(),
            priority: v.priority,
        })
        .collect();

    let package = Package {
        name: entry.name.clone(),
        essential: entry.essential,
        auto_installed: entry.auto_installed,
        current_version: entry
            .installed_version
            .and_then(|idx| u32::try_from(idx).ok())
            .map(|idx| VersionId(version_id_base + idx)),
        versions: Vec::new(),
    };

    PackageSnapshot { package, versions }
}

#[async_trait]
impl ExecutorBackend for FileBackend {
    async fn archive_fetch(&self, _package: &str, on_progress: &ProgressFn<'_>) -> Result<PathBuf> {
        on_progress(0, 100);
        on_progress(100, 100);
        Ok(PathBuf::from("/dev/null"))
    }

    async fn install_fetched(
        &self,
        _package: &str,
        _archive: &Path,
        on_progress: &ProgressFn<'_>,
    ) -> Result<()> {
        on_progress(100, 100);
        Ok(())
    }

    async fn remove_installed(&self, _package: &str, on_progress: &ProgressFn<'_>) -> Result<()> {
        on_progress(100, 100);
        Ok(())
    }

    async fn update_marks(&self, change_set: &ChangeSet) -> Result<()> {
        let mut catalog = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        for package in &mut catalog.packages {
            if change_set.removed.contains(&package.name)
                || change_set.extra_removed.contains(&package.name)
            {
                package.installed_version = None;
            } else if change_set.new_installed.contains(&package.name)
                || change_set.upgraded.contains(&package.name)
                || change_set.reinstalled.contains(&package.name)
            {
                package.installed_version = package.versions.len().checked_sub(1);
                package.auto_installed = false;
            } else if change_set.extra_installed.contains(&package.name) {
                package.installed_version = package.versions.len().checked_sub(1);
                package.auto_installed = true;
            }
        }

        self.persist(&catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Catalog {
        Catalog {
            packages: vec![CatalogPackage {
                name: "vim".to_string(),
                essential: false,
                auto_installed: false,
                installed_version: None,
                versions: vec![CatalogVersion {
                    version: "9.0".to_string(),
                    download_size: 1024,
                    installed_size: 2048,
                    architecture: "x86_64".to_string(),
                    downloadable: true,
                    provides: Vec::new(),
                    depends: Vec::new(),
                    section: "editors".to_string(),
                    priority: 0,
                }],
            }],
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        save_catalog(&path, &sample_catalog()).unwrap();
        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded.packages.len(), 1);
        assert_eq!(loaded.packages[0].name, "vim");
    }

    #[test]
    fn missing_catalog_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_catalog(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.packages.is_empty());
    }

    #[tokio::test]
    async fn update_marks_records_install() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        save_catalog(&path, &sample_catalog()).unwrap();

        let backend = FileBackend::open(&path).unwrap();
        let plan = ChangeSet {
            new_installed: vec!["vim".to_string()],
            ..Default::default()
        };
        backend.update_marks(&plan).await.unwrap();

        let reloaded = load_catalog(&path).unwrap();
        assert_eq!(reloaded.packages[0].installed_version, Some(0));
    }
}
