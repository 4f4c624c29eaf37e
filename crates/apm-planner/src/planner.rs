//! Planner (C4): the single `plan_change` entry point and its convenience
//! wrappers (§4.4, §6).

use crate::change_set::ChangeSet;
use crate::mark::{InstallKind, Mark, MarkState, candidate_version};
use crate::resolver::ProblemResolver;
use ahash::AHashSet;
use apm_core::{Context, Error, RequirementSpec, Result};
use apm_universe::{PackageId, Requirement, UniverseData};
use tracing::{info_span, warn};

/// Resolves `spec` against the Universe the way §4.4 step 3.a/3.b do:
/// exact name first, then virtual providers scored and the highest
/// picked. Returns the chosen handle and its canonical name.
fn resolve_install_target(
    universe: &UniverseData,
    resolver: &ProblemResolver<'_>,
    spec: &RequirementSpec,
    prefer_first: bool,
) -> Result<PackageId> {
    if let Some(pkg) = universe.find(spec.name()) {
        if universe.package(pkg).is_pure_virtual() {
            return resolve_virtual_target(universe, spec, prefer_first);
        }
        return Ok(pkg);
    }

    let req = Requirement::from(spec);
    let candidates = universe.resolve_virtual(spec.name(), Some(&req));
    if candidates.is_empty() {
        return Err(Error::package_not_found(
            spec.name(),
            "no package or provider resolves",
        ));
    }
    let sorted = resolver.score_sort(&candidates);
    Ok(sorted[0].0)
}

fn resolve_virtual_target(
    universe: &UniverseData,
    spec: &RequirementSpec,
    prefer_first: bool,
) -> Result<PackageId> {
    let req = Requirement::from(spec);
    let mut providers = universe.resolve_virtual(spec.name(), Some(&req));
    providers.sort_by_key(|(pkg, _)| *pkg);
    providers.dedup_by_key(|(pkg, _)| *pkg);

    if let Some((pkg, _)) = providers
        .iter()
        .find(|(pkg, _)| universe.package(*pkg).current_version.is_some())
    {
        return Ok(*pkg);
    }

    match providers.len() {
        0 => Err(Error::package_not_found(
            spec.name(),
            format!("{} has no installable providers", spec.name()),
        )),
        1 => Ok(providers[0].0),
        _ if prefer_first => Ok(providers[0].0),
        _ => {
            let names: Vec<_> = providers
                .iter()
                .map(|(pkg, _)| universe.package(*pkg).name.clone())
                .collect();
            Err(Error::package_not_found(
                spec.name(),
                format!("multiple providers available: {}", names.join(", ")),
            ))
        }
    }
}

fn format_requirement(req: &Requirement) -> String {
    match (&req.op, &req.version) {
        (Some(op), Some(version)) => format!("{} {op} {version}", req.target),
        _ => req.target.clone(),
    }
}

/// The unified entry point described in §4.4/§6. Runs all thirteen
/// algorithm steps in order; any deviation changes observable outputs.
///
/// # Errors
/// Returns `Error::PackageNotFound`, `DependencyBroken`,
/// `OperationIncomplete`, or `DownloadFailed` per §7's taxonomy.
#[allow(clippy::too_many_arguments, clippy::too_many_lines)]
pub fn plan_change(
    universe: &UniverseData,
    marks: &mut MarkState,
    ctx: &Context,
    installs: &[RequirementSpec],
    reinstalls: &[RequirementSpec],
    removes: &[RequirementSpec],
    purge: bool,
    remove_depends: bool,
    apply: bool,
) -> Result<ChangeSet> {
    let _span = info_span!(
        "plan_change",
        installs = installs.len(),
        reinstalls = reinstalls.len(),
        removes = removes.len(),
        apply
    )
    .entered();

    // Step 1: backend archive preprocessing has no counterpart here — this
    // Universe's backing store (§4.2) carries only named packages, never
    // loose archive files, so there is nothing to preprocess or refresh.

    // Step 2.
    let snapshot = (!apply).then(|| marks.snapshot());

    let mut resolver = ProblemResolver::new(universe, remove_depends || ctx.remove_depends_default);
    let mut requested_install: Vec<(PackageId, String)> = Vec::new();
    let mut requested_remove: Vec<(PackageId, String)> = Vec::new();
    let mut requested_reinstall: Vec<(PackageId, String)> = Vec::new();

    // Step 3: resolve installs.
    for spec in installs {
        let pkg = resolve_install_target(
            universe,
            &resolver,
            spec,
            ctx.install_virtual_prefers_first,
        )?;
        let name = universe.package(pkg).name.clone();
        requested_install.push((pkg, name));
        marks.mark_install(universe, pkg, InstallKind::Manual, false);
        if marks.is_now_broken(universe, pkg) || marks.is_inst_broken(universe, pkg) {
            marks.mark_install(universe, pkg, InstallKind::Manual, true);
        }
    }

    // Step 4: resolve reinstalls.
    for spec in reinstalls {
        let pkg = resolve_install_target(
            universe,
            &resolver,
            spec,
            ctx.install_virtual_prefers_first,
        )?;
        let package = universe.package(pkg);
        if package.current_version.is_none() {
            return Err(Error::package_not_found(
                spec.name(),
                format!("{} is not installed, so cannot be reinstalled", spec.name()),
            ));
        }
        let current = universe.version(package.current_version.unwrap());
        if !current.downloadable {
            return Err(Error::download_failed(format!(
                "{} is not downloadable, so cannot be reinstalled",
                spec.name()
            )));
        }
        requested_reinstall.push((pkg, package.name.clone()));
        marks.mark_reinstall(pkg);
    }

    // Step 5: resolve removes.
    for spec in removes {
        let pkg = match universe.find(spec.name()) {
            Some(pkg) => pkg,
            None => {
                let req = Requirement::from(spec);
                let mut providers: Vec<_> = universe
                    .resolve_virtual(spec.name(), Some(&req))
                    .into_iter()
                    .filter(|(p, _)| universe.package(*p).current_version.is_some())
                    .collect();
                providers.sort_by_key(|(p, _)| *p);
                providers.dedup_by_key(|(p, _)| *p);
                match providers.len() {
                    1 => providers[0].0,
                    0 => {
                        return Err(Error::package_not_found(
                            spec.name(),
                            format!("{} is not installed, so not removed", spec.name()),
                        ));
                    }
                    _ => {
                        let names: Vec<_> = providers
                            .iter()
                            .map(|(p, _)| universe.package(*p).name.clone())
                            .collect();
                        return Err(Error::dependency_broken(format!(
                            "Virtual package {} has multiple installed providers: {}. Please remove specific package.",
                            spec.name(),
                            names.join(", ")
                        )));
                    }
                }
            }
        };

        if universe.package(pkg).essential {
            return Err(Error::operation_incomplete(format!(
                "Cannot remove essential package: {}",
                universe.package(pkg).name
            )));
        }

        let name = universe.package(pkg).name.clone();
        marks.mark_delete(pkg, purge);
        requested_remove.push((pkg, name));
    }

    // Step 6: conflict check over requested installs only.
    for i in 0..requested_install.len() {
        for j in 0..requested_install.len() {
            if i == j {
                continue;
            }
            let (a_id, a_name) = &requested_install[i];
            let (b_id, b_name) = &requested_install[j];
            let Some(a_candidate) = candidate_version(universe, *a_id) else {
                continue;
            };
            let conflicts = &universe.version(a_candidate).relations.conflicts;
            let Some(b_candidate) = candidate_version(universe, *b_id) else {
                continue;
            };
            let b_version = &universe.version(b_candidate).version;
            if conflicts
                .iter()
                .any(|req| req.target == *b_name && req.matches(b_version))
            {
                return Err(Error::dependency_broken(format!(
                    "Conflicting packages: {a_name} and {b_name}"
                )));
            }
        }
    }

    // Step 7: pre-install dependency pull.
    for (pkg, _) in &requested_install {
        if !matches!(marks.get(*pkg), Mark::Install(_)) {
            continue;
        }
        let Some(candidate) = candidate_version(universe, *pkg) else {
            continue;
        };
        let groups: Vec<_> = universe
            .version(candidate)
            .relations
            .critical_groups()
            .cloned()
            .collect();
        for group in &groups {
            if marks.group_satisfied(universe, group) {
                continue;
            }
            for req in group {
                if let Some(target) = universe.find(&req.target) {
                    if candidate_version(universe, target).is_some() {
                        marks.mark_install(universe, target, InstallKind::Auto, true);
                        break;
                    }
                }
            }
        }
    }

    // Step 8: pre-remove validation.
    for (pkg, name) in &requested_remove {
        if matches!(marks.get(*pkg), Mark::Delete { .. }) && universe.package(*pkg).essential {
            return Err(Error::operation_incomplete(format!(
                "Cannot remove essential package: {name}"
            )));
        }
    }

    // Step 9: problem-resolver sweep.
    for (pkg, _) in &requested_install {
        resolver.clear(*pkg);
        resolver.protect(*pkg);
    }
    for (pkg, _) in &requested_remove {
        resolver.clear(*pkg);
        resolver.protect(*pkg);
        resolver.remove(*pkg);
    }
    resolver.install_protect(marks);
    let _ = resolver.resolve(marks, true);

    // Step 10: safety net.
    for (pkg, _) in &requested_install {
        if matches!(marks.get(*pkg), Mark::Keep) && universe.package(*pkg).current_version.is_none() {
            marks.mark_install(universe, *pkg, InstallKind::Manual, false);
        }
    }

    // Step 11: breakage audit.
    let broken_count = marks.broken_count(universe);
    if broken_count > 0 {
        let mut entries = Vec::new();
        for (pkg, package) in universe.iter() {
            if marks.is_inst_broken(universe, pkg) || marks.is_now_broken(universe, pkg) {
                if let Some(group) = marks.first_broken_group(universe, pkg) {
                    if let Some(first) = group.first() {
                        entries.push(format!(
                            "{} (depends: {})",
                            package.name,
                            format_requirement(first)
                        ));
                    }
                }
            }
        }
        warn!(broken_count, "breakage audit failed");
        if let Some(snapshot) = snapshot {
            marks.restore(snapshot);
        }
        return Err(Error::dependency_broken(entries.join("; ")));
    }

    // Step 12: change collection.
    let requested_install_names: AHashSet<_> =
        requested_install.iter().map(|(_, n)| n.clone()).collect();
    let requested_remove_names: AHashSet<_> =
        requested_remove.iter().map(|(_, n)| n.clone()).collect();

    let mut change = ChangeSet::default();
    let mut install_size_delta: i64 = 0;

    for (pkg, package) in universe.iter() {
        match marks.get(pkg) {
            Mark::Install(_) => {
                let Some(candidate) = candidate_version(universe, pkg) else {
                    continue;
                };
                let version = universe.version(candidate);
                change.new_installed.push(package.name.clone());
                if !requested_install_names.contains(&package.name) {
                    change.extra_installed.push(package.name.clone());
                }
                change.download_size += version.download_size;
                install_size_delta += i64::try_from(version.installed_size).unwrap_or(i64::MAX);
            }
            Mark::Upgrade => {
                let Some(candidate) = candidate_version(universe, pkg) else {
                    continue;
                };
                let version = universe.version(candidate);
                change.upgraded.push(package.name.clone());
                change.download_size += version.download_size;
                install_size_delta += i64::try_from(version.installed_size).unwrap_or(i64::MAX);
                if let Some(current_id) = package.current_version {
                    install_size_delta -=
                        i64::try_from(universe.version(current_id).installed_size).unwrap_or(i64::MAX);
                }
            }
            Mark::Reinstall => {
                if let Some(current_id) = package.current_version {
                    let current = universe.version(current_id);
                    change.new_installed.push(package.name.clone());
                    change.download_size += current.download_size;
                }
            }
            Mark::Delete { .. } => {
                change.removed.push(package.name.clone());
                if !requested_remove_names.contains(&package.name) {
                    change.extra_removed.push(package.name.clone());
                }
                if let Some(current_id) = package.current_version {
                    install_size_delta -=
                        i64::try_from(universe.version(current_id).installed_size).unwrap_or(i64::MAX);
                }
            }
            Mark::Keep => {
                if let Some(current_id) = package.current_version {
                    if let Some(candidate) = candidate_version(universe, pkg) {
                        if apm_core::compare_versions(
                            &universe.version(candidate).version,
                            &universe.version(current_id).version,
                        ) == std::cmp::Ordering::Greater
                        {
                            change.not_upgraded.push(package.name.clone());
                        }
                    }
                }
            }
        }
    }

    change.install_size = u64::try_from(install_size_delta.max(0)).unwrap_or(0);

    // Step 13: rollback if simulating.
    if let Some(snapshot) = snapshot {
        marks.restore(snapshot);
    }

    Ok(change)
}

/// `plan_change` reduced to a single install request.
///
/// # Errors
/// See [`plan_change`].
pub fn simulate_install(
    universe: &UniverseData,
    marks: &mut MarkState,
    ctx: &Context,
    installs: &[RequirementSpec],
) -> Result<ChangeSet> {
    plan_change(universe, marks, ctx, installs, &[], &[], false, false, false)
}

/// `plan_change` reduced to a single remove request.
///
/// # Errors
/// See [`plan_change`].
pub fn simulate_remove(
    universe: &UniverseData,
    marks: &mut MarkState,
    ctx: &Context,
    removes: &[RequirementSpec],
    purge: bool,
) -> Result<ChangeSet> {
    plan_change(universe, marks, ctx, &[], &[], removes, purge, false, false)
}

/// `plan_change` reduced to a single reinstall request.
///
/// # Errors
/// See [`plan_change`].
pub fn simulate_reinstall(
    universe: &UniverseData,
    marks: &mut MarkState,
    ctx: &Context,
    reinstalls: &[RequirementSpec],
) -> Result<ChangeSet> {
    plan_change(universe, marks, ctx, &[], reinstalls, &[], false, false, false)
}

/// Marks every installed package for upgrade, then runs steps 9-13 of
/// §4.4 (the resolver sweep and collection, with no new requested set).
///
/// # Errors
/// See [`plan_change`].
pub fn simulate_dist_upgrade(
    universe: &UniverseData,
    marks: &mut MarkState,
    ctx: &Context,
) -> Result<ChangeSet> {
    let snapshot = marks.snapshot();
    for (pkg, package) in universe.iter() {
        if let (Some(current), Some(candidate)) = (package.current_version, candidate_version(universe, pkg)) {
            if current == candidate {
                marks.mark_keep(pkg);
            } else {
                marks.mark_upgrade(pkg);
            }
        }
    }

    let mut resolver = ProblemResolver::new(universe, ctx.remove_depends_default);
    resolver.install_protect(marks);
    let _ = resolver.resolve(marks, true);

    let broken_count = marks.broken_count(universe);
    if broken_count > 0 {
        marks.restore(snapshot);
        return Err(Error::dependency_broken(
            "dist-upgrade left unresolved dependency breakage",
        ));
    }

    let result = collect_without_requested(universe, marks);
    marks.restore(snapshot);
    Ok(result)
}

/// Asks the backend for its kept-vs-unneeded partition (here: auto-
/// installed packages no longer required by any installed package's
/// critical dependencies), marks the unneeded set for deletion, then runs
/// the resolver sweep and collection. Never returns `extra_*` lists.
///
/// # Errors
/// See [`plan_change`].
pub fn simulate_autoremove(
    universe: &UniverseData,
    marks: &mut MarkState,
    ctx: &Context,
) -> Result<ChangeSet> {
    let snapshot = marks.snapshot();

    let mut still_needed: AHashSet<PackageId> = AHashSet::default();
    for (_, package) in universe.iter() {
        if package.current_version.is_none() {
            continue;
        }
        let Some(version_id) = package.current_version else {
            continue;
        };
        for group in universe.version(version_id).relations.critical_groups() {
            for req in group {
                if let Some(target) = universe.find(&req.target) {
                    still_needed.insert(target);
                }
            }
        }
    }

    for (pkg, package) in universe.iter() {
        if package.auto_installed && package.current_version.is_some() && !still_needed.contains(&pkg) {
            marks.mark_delete(pkg, false);
        }
    }

    let mut resolver = ProblemResolver::new(universe, ctx.remove_depends_default);
    let _ = resolver.resolve(marks, true);

    let mut result = collect_without_requested(universe, marks);
    result.extra_installed.clear();
    result.extra_removed.clear();
    marks.restore(snapshot);
    Ok(result)
}

fn collect_without_requested(universe: &UniverseData, marks: &MarkState) -> ChangeSet {
    let mut change = ChangeSet::default();
    let mut install_size_delta: i64 = 0;

    for (pkg, package) in universe.iter() {
        match marks.get(pkg) {
            Mark::Upgrade => {
                if let Some(candidate) = candidate_version(universe, pkg) {
                    let version = universe.version(candidate);
                    change.upgraded.push(package.name.clone());
                    change.download_size += version.download_size;
                    install_size_delta += i64::try_from(version.installed_size).unwrap_or(i64::MAX);
                    if let Some(current_id) = package.current_version {
                        install_size_delta -= i64::try_from(universe.version(current_id).installed_size)
                            .unwrap_or(i64::MAX);
                    }
                }
            }
            Mark::Delete { .. } => {
                change.removed.push(package.name.clone());
                if let Some(current_id) = package.current_version {
                    install_size_delta -=
                        i64::try_from(universe.version(current_id).installed_size).unwrap_or(i64::MAX);
                }
            }
            Mark::Install(_) => {
                if let Some(candidate) = candidate_version(universe, pkg) {
                    let version = universe.version(candidate);
                    change.new_installed.push(package.name.clone());
                    change.download_size += version.download_size;
                    install_size_delta += i64::try_from(version.installed_size).unwrap_or(i64::MAX);
                }
            }
            Mark::Reinstall | Mark::Keep => {}
        }
    }

    change.install_size = u64::try_from(install_size_delta.max(0)).unwrap_or(0);
    change
}
