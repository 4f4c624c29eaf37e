//! Change-Set Value (C9): the immutable result of planning.

/// The proposed change set and its sizes. Pure value object; equality is
/// structural (§4.9).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChangeSet {
    /// Packages installed for the first time.
    pub new_installed: Vec<String>,
    /// Packages moved to a newer candidate version.
    pub upgraded: Vec<String>,
    /// Packages reinstalled at their current version.
    pub reinstalled: Vec<String>,
    /// Packages removed.
    pub removed: Vec<String>,
    /// Installed but not explicitly requested.
    pub extra_installed: Vec<String>,
    /// Removed but not explicitly requested.
    pub extra_removed: Vec<String>,
    /// Packages that could have been upgraded but were held back.
    pub not_upgraded: Vec<String>,
    /// Total bytes to download.
    pub download_size: u64,
    /// Net installed-size delta, clamped to zero if negative (§4.9,
    /// §9 decision (a)).
    pub install_size: u64,
}
