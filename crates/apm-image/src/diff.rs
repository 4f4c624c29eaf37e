//! Desired-vs-actual reconciliation (§4.7).
//!
//! `install = desired.names() ∖ actual` preserving desired order;
//! `remove = actual ∖ desired.names()` in sorted order.

use crate::types::{DesiredState, ReconcileDelta};
use std::collections::HashSet;

/// Computes the normalized `(install, remove)` pair for `desired` against
/// the currently installed package names in `actual`.
#[must_use]
pub fn reconcile(desired: &DesiredState, actual: &[String]) -> ReconcileDelta {
    let actual_set: HashSet<&str> = actual.iter().map(String::as_str).collect();
    let desired_set: HashSet<&str> = desired.names().into_iter().collect();

    let install = desired
        .packages
        .iter()
        .filter(|p| !actual_set.contains(p.name.as_str()))
        .cloned()
        .collect();

    let mut remove: Vec<String> = actual
        .iter()
        .filter(|name| !desired_set.contains(name.as_str()))
        .cloned()
        .collect();
    remove.sort();

    ReconcileDelta { install, remove }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackageSpec;

    #[test]
    fn install_preserves_desired_order() {
        let desired = DesiredState {
            packages: vec![
                PackageSpec::new("zsh"),
                PackageSpec::new("vim"),
                PackageSpec::new("curl"),
            ],
            ..Default::default()
        };
        let delta = reconcile(&desired, &[]);
        let names: Vec<&str> = delta.install.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zsh", "vim", "curl"]);
    }

    #[test]
    fn remove_is_sorted() {
        let desired = DesiredState::default();
        let actual = vec!["zsh".to_string(), "curl".to_string(), "bash".to_string()];
        let delta = reconcile(&desired, &actual);
        assert_eq!(delta.remove, vec!["bash", "curl", "zsh"]);
    }

    #[test]
    fn already_installed_packages_are_neither_installed_nor_removed() {
        let desired = DesiredState {
            packages: vec![PackageSpec::new("vim")],
            ..Default::default()
        };
        let actual = vec!["vim".to_string()];
        let delta = reconcile(&desired, &actual);
        assert!(delta.is_empty());
    }

    #[test]
    fn pinned_version_is_preserved_in_install_list() {
        let desired = DesiredState {
            packages: vec![PackageSpec::pinned("vim", "2:9.0-1")],
            ..Default::default()
        };
        let delta = reconcile(&desired, &[]);
        assert_eq!(delta.install[0].version.as_deref(), Some("2:9.0-1"));
    }

    #[test]
    fn mixed_install_and_remove() {
        let desired = DesiredState {
            packages: vec![PackageSpec::new("vim"), PackageSpec::new("tmux")],
            ..Default::default()
        };
        let actual = vec!["vim".to_string(), "nano".to_string()];
        let delta = reconcile(&desired, &actual);
        assert_eq!(delta.install.len(), 1);
        assert_eq!(delta.install[0].name, "tmux");
        assert_eq!(delta.remove, vec!["nano"]);
    }
}
