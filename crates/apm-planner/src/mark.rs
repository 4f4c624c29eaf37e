//! Mark State (C3): the mutable per-package decision overlay on a Universe
//! snapshot, plus the derived brokenness predicates the Planner consults.

use ahash::AHashMap;
use apm_universe::{PackageId, UniverseData, VersionId};

/// Whether an install was requested by name or pulled in to satisfy a
/// dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallKind {
    /// Named explicitly by the caller.
    Manual,
    /// Pulled in to satisfy another package's dependency.
    Auto,
}

/// The decision recorded for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// No change.
    Keep,
    /// Not currently installed; install the candidate version.
    Install(InstallKind),
    /// Currently installed; move to the candidate version.
    Upgrade,
    /// Currently installed; reinstall the same version.
    Reinstall,
    /// Remove; `purge` additionally drops configuration.
    Delete {
        /// Whether configuration files are also removed.
        purge: bool,
    },
}

/// An opaque copy of every mark, for `snapshot`/`restore` (§4.3).
#[derive(Debug, Clone)]
pub struct MarkSnapshot(AHashMap<PackageId, Mark>);

/// The per-package decision overlay described in §3/§4.3.
#[derive(Debug)]
pub struct MarkState {
    marks: AHashMap<PackageId, Mark>,
}

impl MarkState {
    /// Builds a Mark State where every currently-installed package starts
    /// `Keep` and everything else is implicitly `Keep` (untouched).
    #[must_use]
    pub fn new() -> Self {
        Self {
            marks: AHashMap::default(),
        }
    }

    /// The current mark for `pkg`, defaulting to `Keep`.
    #[must_use]
    pub fn get(&self, pkg: PackageId) -> Mark {
        self.marks.get(&pkg).copied().unwrap_or(Mark::Keep)
    }

    /// Marks `pkg` for installation. When `allow_autoinstall_broken` is
    /// set, any unsatisfied critical dependency group on the candidate
    /// version is repaired by marking its first installable alternative
    /// `Install(Auto)` (§4.3).
    pub fn mark_install(
        &mut self,
        universe: &UniverseData,
        pkg: PackageId,
        kind: InstallKind,
        allow_autoinstall_broken: bool,
    ) {
        self.marks.insert(pkg, Mark::Install(kind));
        if allow_autoinstall_broken {
            self.pull_critical_deps(universe, pkg);
        }
    }

    /// Marks `pkg` to be reinstalled at its currently-installed version.
    pub fn mark_reinstall(&mut self, pkg: PackageId) {
        self.marks.insert(pkg, Mark::Reinstall);
    }

    /// Marks `pkg` to move to its candidate version. Used by
    /// `simulate_dist_upgrade`, which (unlike `plan_change`) is allowed to
    /// mark already-installed packages directly rather than going through
    /// the install-request pipeline.
    pub fn mark_upgrade(&mut self, pkg: PackageId) {
        self.marks.insert(pkg, Mark::Upgrade);
    }

    /// Marks `pkg` for removal.
    pub fn mark_delete(&mut self, pkg: PackageId, purge: bool) {
        self.marks.insert(pkg, Mark::Delete { purge });
    }

    /// Resets `pkg` to `Keep`.
    pub fn mark_keep(&mut self, pkg: PackageId) {
        self.marks.insert(pkg, Mark::Keep);
    }

    /// Captures every mark for later `restore`.
    #[must_use]
    pub fn snapshot(&self) -> MarkSnapshot {
        MarkSnapshot(self.marks.clone())
    }

    /// Restores a previously captured snapshot, discarding any marks made
    /// since.
    pub fn restore(&mut self, snapshot: MarkSnapshot) {
        self.marks = snapshot.0;
    }

    /// The version that would be active for `pkg` under the current mark:
    /// `None` if deleted or never installed and not marked for install;
    /// the candidate version for `Install`/`Upgrade`/`Reinstall`; the
    /// current version for `Keep`.
    #[must_use]
    pub fn effective_version(&self, universe: &UniverseData, pkg: PackageId) -> Option<VersionId> {
        match self.get(pkg) {
            Mark::Delete { .. } => None,
            Mark::Keep => universe.package(pkg).current_version,
            Mark::Install(_) | Mark::Upgrade | Mark::Reinstall => candidate_version(universe, pkg),
        }
    }

    /// Is `pkg` currently installed and will remain effectively installed,
    /// but with an unsatisfied critical dependency?
    #[must_use]
    pub fn is_inst_broken(&self, universe: &UniverseData, pkg: PackageId) -> bool {
        universe.package(pkg).current_version.is_some()
            && !matches!(self.get(pkg), Mark::Delete { .. })
            && self.first_broken_group(universe, pkg).is_some()
    }

    /// Is `pkg` being newly installed (was not installed before) but ends
    /// up with an unsatisfied critical dependency?
    #[must_use]
    pub fn is_now_broken(&self, universe: &UniverseData, pkg: PackageId) -> bool {
        universe.package(pkg).current_version.is_none()
            && matches!(self.get(pkg), Mark::Install(_))
            && self.first_broken_group(universe, pkg).is_some()
    }

    /// Is `pkg` being installed for the first time (not previously
    /// installed, and ends up active)?
    #[must_use]
    pub fn is_new_install(&self, pkg: PackageId, universe: &UniverseData) -> bool {
        universe.package(pkg).current_version.is_none() && matches!(self.get(pkg), Mark::Install(_))
    }

    /// Number of packages currently `InstBroken` or `NowBroken`.
    #[must_use]
    pub fn broken_count(&self, universe: &UniverseData) -> usize {
        universe
            .iter()
            .filter(|(id, _)| self.is_inst_broken(universe, *id) || self.is_now_broken(universe, *id))
            .count()
    }

    /// The first unsatisfied critical dependency group for `pkg`'s
    /// effective version, if any — used both for brokenness checks and
    /// for the breakage-audit message (§4.4 step 11).
    #[must_use]
    pub fn first_broken_group<'u>(
        &self,
        universe: &'u UniverseData,
        pkg: PackageId,
    ) -> Option<&'u apm_universe::OrGroup> {
        let version_id = self.effective_version(universe, pkg)?;
        let version = universe.version(version_id);
        version
            .relations
            .critical_groups()
            .find(|group| !self.group_satisfied(universe, group))
    }

    /// Does any alternative in `group` resolve to an active package under
    /// the current marks?
    #[must_use]
    pub fn group_satisfied(&self, universe: &UniverseData, group: &apm_universe::OrGroup) -> bool {
        group.iter().any(|req| self.requirement_satisfied(universe, req))
    }

    /// Is `req` satisfied by some active (installed-or-marked-install)
    /// package or virtual provider?
    #[must_use]
    pub fn requirement_satisfied(&self, universe: &UniverseData, req: &apm_universe::Requirement) -> bool {
        if let Some(pkg) = universe.find(&req.target) {
            if let Some(version_id) = self.effective_version(universe, pkg) {
                if req.matches(&universe.version(version_id).version) {
                    return true;
                }
            }
        }

        universe
            .resolve_virtual(&req.target, Some(req))
            .into_iter()
            .any(|(pkg, _)| self.effective_version(universe, pkg).is_some())
    }

    /// One-level dependency pull used by `mark_install` when
    /// `allow_autoinstall_broken` is set: for every unsatisfied critical
    /// group, install the first alternative with a candidate version.
    fn pull_critical_deps(&mut self, universe: &UniverseData, pkg: PackageId) {
        let Some(version_id) = self.effective_version(universe, pkg) else {
            return;
        };
        let version = universe.version(version_id);
        let groups: Vec<_> = version.relations.critical_groups().cloned().collect();
        for group in &groups {
            if self.group_satisfied(universe, group) {
                continue;
            }
            for req in group {
                if let Some(target) = universe.find(&req.target) {
                    if candidate_version(universe, target).is_some() {
                        self.marks.insert(target, Mark::Install(InstallKind::Auto));
                        break;
                    }
                }
            }
        }
    }
}

impl Default for MarkState {
    fn default() -> Self {
        Self::new()
    }
}

/// The version a package would move to if marked for install/upgrade: the
/// highest version known, per dpkg/rpm-style ordering.
#[must_use]
pub fn candidate_version(universe: &UniverseData, pkg: PackageId) -> Option<VersionId> {
    universe
        .package(pkg)
        .versions
        .iter()
        .copied()
        .max_by(|a, b| {
            apm_core::compare_versions(&universe.version(*a).version, &universe.version(*b).version)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use apm_universe::{MemoryBackend, PackageSnapshot, Relations, Universe};

    fn base_package(name: &str) -> apm_universe::Package {
        apm_universe::Package {
            name: name.to_string(),
            essential: false,
            auto_installed: false,
            current_version: None,
            versions: Vec::new(),
        }
    }

    fn base_version() -> apm_universe::PackageVersion {
        apm_universe::PackageVersion {
            package: PackageId(0),
            version: "1.0".to_string(),
            download_size: 10,
            installed_size: 10,
            architecture: "x86_64".to_string(),
            downloadable: true,
            provides: Vec::new(),
            relations: Relations::default(),
            section: "admin".to_string(),
            priority: 0,
        }
    }

    #[test]
    fn snapshot_restore_round_trips() {
        let universe = Universe::open(MemoryBackend::new(vec![PackageSnapshot {
            package: base_package("vim"),
            versions: vec![base_version()],
        }]))
        .unwrap();
        let view = universe.view();
        let pkg = view.find("vim").unwrap();

        let mut marks = MarkState::new();
        let before = marks.snapshot();
        marks.mark_install(&view, pkg, InstallKind::Manual, false);
        assert_eq!(marks.get(pkg), Mark::Install(InstallKind::Manual));
        marks.restore(before);
        assert_eq!(marks.get(pkg), Mark::Keep);
    }

    #[test]
    fn unsatisfied_critical_dep_marks_now_broken() {
        let mut vim = base_version();
        vim.relations.depends.push(vec![apm_universe::Requirement::any("libc")]);
        let universe = Universe::open(MemoryBackend::new(vec![PackageSnapshot {
            package: base_package("vim"),
            versions: vec![vim],
        }]))
        .unwrap();
        let view = universe.view();
        let pkg = view.find("vim").unwrap();

        let mut marks = MarkState::new();
        marks.mark_install(&view, pkg, InstallKind::Manual, false);
        assert!(marks.is_now_broken(&view, pkg));
        assert_eq!(marks.broken_count(&view), 1);
    }

    #[test]
    fn allow_autoinstall_broken_pulls_dependency() {
        let mut vim = base_version();
        vim.relations.depends.push(vec![apm_universe::Requirement::any("libc")]);
        let libc = base_version();
        let universe = Universe::open(MemoryBackend::new(vec![
            PackageSnapshot {
                package: base_package("vim"),
                versions: vec![vim],
            },
            PackageSnapshot {
                package: base_package("libc"),
                versions: vec![libc],
            },
        ]))
        .unwrap();
        let view = universe.view();
        let vim_id = view.find("vim").unwrap();
        let libc_id = view.find("libc").unwrap();

        let mut marks = MarkState::new();
        marks.mark_install(&view, vim_id, InstallKind::Manual, true);
        assert_eq!(marks.get(libc_id), Mark::Install(InstallKind::Auto));
        assert!(!marks.is_now_broken(&view, vim_id));
    }
}
