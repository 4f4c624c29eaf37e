//! The error taxonomy shared by every planning and execution entry point.
//!
//! Every variant carries a single free-form message field (per the design
//! note on string-typed errors) plus whatever structured fields the caller
//! needs to render a useful report. Each variant also has a stable
//! documentation code so a CLI or bus facade can show `[E-DEP-BROKEN]`
//! next to the human message without hard-coding it at every call site.

use thiserror::Error;

/// The ten error kinds produced by the planner, executor, and reconciler.
#[derive(Debug, Error)]
pub enum Error {
    /// No package or provider resolves.
    #[error("package '{name}' not found: {reason}")]
    PackageNotFound {
        /// The name that failed to resolve.
        name: String,
        /// Why it failed to resolve.
        reason: String,
    },

    /// A plan cannot be made consistent.
    #[error("{message}")]
    DependencyBroken {
        /// Enumerated broken entries or a conflicting pair, as prose.
        message: String,
    },

    /// A structurally forbidden action was requested.
    #[error("{message}")]
    OperationIncomplete {
        /// What was forbidden and why.
        message: String,
    },

    /// A reinstall target is not downloadable, or the archive fetch phase
    /// failed.
    #[error("{message}")]
    DownloadFailed {
        /// Description of the failure.
        message: String,
    },

    /// The backend failed to materialize the plan.
    #[error("{message}")]
    InstallFailed {
        /// The backend's accumulated error message, or a fixed fallback.
        message: String,
    },

    /// The backend reported a generic failure.
    #[error("{message}")]
    OperationFailed {
        /// The backend's accumulated error message.
        message: String,
    },

    /// Caller-supplied structural violation.
    #[error("{message}")]
    InvalidParameters {
        /// What was invalid.
        message: String,
    },

    /// Another process holds the backend lock.
    #[error("{message}")]
    LockFailed {
        /// Description, typically including the holder's PID if known.
        message: String,
    },

    /// The caller's cancellation token was observed at a suspension point.
    #[error("operation cancelled")]
    Cancelled,

    /// Catch-all for unexpected backend faults.
    #[error("{message}")]
    Unknown {
        /// Whatever the backend reported.
        message: String,
    },
}

impl Error {
    /// Stable documentation code for this error kind, independent of the
    /// message it carries.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PackageNotFound { .. } => "E-PKG-NOTFOUND",
            Self::DependencyBroken { .. } => "E-DEP-BROKEN",
            Self::OperationIncomplete { .. } => "E-OP-INCOMPLETE",
            Self::DownloadFailed { .. } => "E-DOWNLOAD",
            Self::InstallFailed { .. } => "E-INSTALL",
            Self::OperationFailed { .. } => "E-OP-FAILED",
            Self::InvalidParameters { .. } => "E-PARAMS",
            Self::LockFailed { .. } => "E-LOCK",
            Self::Cancelled => "E-CANCELLED",
            Self::Unknown { .. } => "E-UNKNOWN",
        }
    }

    /// A package or provider could not be resolved.
    #[must_use]
    pub fn package_not_found(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PackageNotFound {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// A plan could not be made consistent; `message` should already be
    /// fully formatted (e.g. "Conflicting packages: a and b").
    #[must_use]
    pub fn dependency_broken(message: impl Into<String>) -> Self {
        Self::DependencyBroken {
            message: message.into(),
        }
    }

    /// A structurally forbidden action was requested.
    #[must_use]
    pub fn operation_incomplete(message: impl Into<String>) -> Self {
        Self::OperationIncomplete {
            message: message.into(),
        }
    }

    /// An archive fetch or reinstall-downloadability check failed.
    #[must_use]
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// The backend failed to materialize the plan; an empty `message`
    /// becomes a fixed fallback per §4.6.
    #[must_use]
    pub fn install_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::InstallFailed {
            message: if message.is_empty() {
                "the backend failed to materialize the plan".to_string()
            } else {
                message
            },
        }
    }

    /// The backend reported a generic failure.
    #[must_use]
    pub fn operation_failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::OperationFailed {
            message: if message.is_empty() {
                "the backend reported an unspecified failure".to_string()
            } else {
                message
            },
        }
    }

    /// A caller-supplied argument violates a structural invariant.
    #[must_use]
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Another process holds the lock.
    #[must_use]
    pub fn lock_failed(message: impl Into<String>) -> Self {
        Self::LockFailed {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
