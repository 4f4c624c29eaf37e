//! Problem Resolver (C5): score-ordered candidate selection that removes
//! brokenness from a Mark State while respecting protected/removed
//! packages (§4.5).

use crate::mark::{InstallKind, Mark, MarkState, candidate_version};
use ahash::AHashSet;
use apm_universe::{PackageId, UniverseData, VersionId};
use std::cmp::Ordering;

/// A resolver bound to one Mark State for the duration of a planning call.
/// Config/stats shape follows the teacher's generic-over-backend resolver;
/// here there is no external fetch, so the struct is just the protected
/// set plus the `remove_depends` policy flag.
#[derive(Debug)]
pub struct ProblemResolver<'u> {
    universe: &'u UniverseData,
    protected: AHashSet<PackageId>,
    removed: AHashSet<PackageId>,
    remove_depends: bool,
}

impl<'u> ProblemResolver<'u> {
    /// Binds a resolver to `universe`. `remove_depends` enables the
    /// "remove broken dependent packages" cascade during `resolve`.
    #[must_use]
    pub fn new(universe: &'u UniverseData, remove_depends: bool) -> Self {
        Self {
            universe,
            protected: AHashSet::default(),
            removed: AHashSet::default(),
            remove_depends,
        }
    }

    /// Drops any protection or removal marking previously recorded for
    /// `pkg` in this resolver (not in the Mark State itself).
    pub fn clear(&mut self, pkg: PackageId) {
        self.protected.remove(&pkg);
        self.removed.remove(&pkg);
    }

    /// Marks `pkg` as protected: the resolver will not demote or remove it
    /// while fixing brokenness elsewhere.
    pub fn protect(&mut self, pkg: PackageId) {
        self.protected.insert(pkg);
    }

    /// Records that `pkg` is being removed by this invocation, so its
    /// dependents are candidates for the `remove_depends` cascade.
    pub fn remove(&mut self, pkg: PackageId) {
        self.removed.insert(pkg);
    }

    /// Re-affirms every protected package's install mark; a no-op unless
    /// a prior step demoted one, since `protect` alone does not mark.
    pub fn install_protect(&mut self, marks: &mut MarkState) {
        for &pkg in &self.protected {
            if matches!(marks.get(pkg), Mark::Keep) && self.universe.package(pkg).current_version.is_none() {
                marks.mark_install(self.universe, pkg, InstallKind::Manual, false);
            }
        }
    }

    /// Attempts to remove brokenness from `marks` by score-ordered
    /// candidate selection. Idempotent: a second call with no intervening
    /// marks makes no further changes since nothing remains fixable.
    ///
    /// Returns `false` if brokenness remains unresolved afterward (the
    /// planner treats this as advisory — the breakage audit in step 11 is
    /// the authoritative signal).
    pub fn resolve(&mut self, marks: &mut MarkState, preserve_auto: bool) -> bool {
        let mut changed = true;
        while changed {
            changed = false;

            if self.remove_depends {
                changed |= self.cascade_removals(marks);
            }

            for (pkg, _) in self.universe.iter() {
                if self.protected.contains(&pkg) {
                    continue;
                }
                if marks.is_now_broken(self.universe, pkg) {
                    let fixed = self.try_satisfy(marks, pkg);
                    if !fixed {
                        marks.mark_keep(pkg);
                    }
                    changed = true;
                } else if marks.is_inst_broken(self.universe, pkg) && !preserve_auto {
                    if !self.try_satisfy(marks, pkg) {
                        marks.mark_delete(pkg, false);
                        changed = true;
                    }
                }
            }
        }

        marks.broken_count(self.universe) == 0
    }

    /// Attempts to satisfy every unsatisfied critical group on `pkg`'s
    /// effective version by marking one alternative per group.
    fn try_satisfy(&self, marks: &mut MarkState, pkg: PackageId) -> bool {
        let Some(group) = marks.first_broken_group(self.universe, pkg).cloned() else {
            return true;
        };
        for req in &group {
            if let Some(target) = self.universe.find(&req.target) {
                if candidate_version(self.universe, target).is_some() {
                    if let Mark::Delete { .. } = marks.get(target) {
                        continue;
                    }
                    if !matches!(marks.get(target), Mark::Install(_) | Mark::Upgrade | Mark::Keep)
                        || self.universe.package(target).current_version.is_none()
                    {
                        marks.mark_install(self.universe, target, InstallKind::Auto, false);
                    }
                    return marks.first_broken_group(self.universe, pkg).is_none();
                }
            }
        }
        group.is_empty()
    }

    /// When `remove_depends` is enabled: any unprotected package whose
    /// only way to stay unbroken depended on a now-removed package is
    /// itself marked for deletion.
    fn cascade_removals(&mut self, marks: &mut MarkState) -> bool {
        let mut changed = false;
        for (pkg, package) in self.universe.iter() {
            if self.protected.contains(&pkg) || package.current_version.is_none() {
                continue;
            }
            if matches!(marks.get(pkg), Mark::Delete { .. }) {
                continue;
            }
            if marks.is_inst_broken(self.universe, pkg) {
                let depends_on_removed = marks
                    .first_broken_group(self.universe, pkg)
                    .is_some_and(|group| {
                        group.iter().any(|req| {
                            self.universe
                                .find(&req.target)
                                .is_some_and(|t| self.removed.contains(&t))
                        })
                    });
                if depends_on_removed {
                    marks.mark_delete(pkg, false);
                    self.removed.insert(pkg);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Orders `candidates` by the resolver's own scoring: essential
    /// first, then currently-installed, then section/priority, then name
    /// (§4.5 — "the planner never overrides it").
    #[must_use]
    pub fn score_sort(&self, candidates: &[(PackageId, VersionId)]) -> Vec<(PackageId, VersionId)> {
        let mut ranked = candidates.to_vec();
        ranked.sort_by(|a, b| self.score_cmp(*a, *b));
        ranked
    }

    fn score_cmp(&self, a: (PackageId, VersionId), b: (PackageId, VersionId)) -> Ordering {
        let pa = self.universe.package(a.0);
        let pb = self.universe.package(b.0);
        let va = self.universe.version(a.1);
        let vb = self.universe.version(b.1);

        pb.essential
            .cmp(&pa.essential)
            .then_with(|| pb.current_version.is_some().cmp(&pa.current_version.is_some()))
            .then_with(|| vb.priority.cmp(&va.priority))
            .then_with(|| va.section.cmp(&vb.section))
            .then_with(|| pa.name.cmp(&pb.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apm_universe::{MemoryBackend, PackageSnapshot, Relations, Universe};

    fn pkg(name: &str, essential: bool) -> apm_universe::Package {
        apm_universe::Package {
            name: name.to_string(),
            essential,
            auto_installed: false,
            current_version: None,
            versions: Vec::new(),
        }
    }

    fn version() -> apm_universe::PackageVersion {
        apm_universe::PackageVersion {
            package: PackageId(0),
            version: "1.0".to_string(),
            download_size: 1,
            installed_size: 1,
            architecture: "x86_64".to_string(),
            downloadable: true,
            provides: Vec::new(),
            relations: Relations::default(),
            section: "admin".to_string(),
            priority: 0,
        }
    }

    #[test]
    fn score_sort_prefers_essential_then_installed() {
        let universe = Universe::open(MemoryBackend::new(vec![
            PackageSnapshot {
                package: pkg("a", false),
                versions: vec![version()],
            },
            PackageSnapshot {
                package: pkg("b", true),
                versions: vec![version()],
            },
        ]))
        .unwrap();
        let view = universe.view();
        let a = view.find("a").unwrap();
        let b = view.find("b").unwrap();
        let av = view.package(a).versions[0];
        let bv = view.package(b).versions[0];

        let resolver = ProblemResolver::new(&view, false);
        let sorted = resolver.score_sort(&[(a, av), (b, bv)]);
        assert_eq!(sorted[0].0, b);
    }

    #[test]
    fn resolve_is_idempotent_with_no_intervening_marks() {
        let universe = Universe::open(MemoryBackend::new(vec![PackageSnapshot {
            package: pkg("vim", false),
            versions: vec![version()],
        }]))
        .unwrap();
        let view = universe.view();
        let mut marks = MarkState::new();
        let mut resolver = ProblemResolver::new(&view, false);
        let first = resolver.resolve(&mut marks, true);
        let second = resolver.resolve(&mut marks, true);
        assert_eq!(first, second);
    }
}
