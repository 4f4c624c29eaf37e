//! Errors raised while locating, parsing, or validating the configuration
//! document, before it has settled into a [`crate::types::ResolvedConfig`].

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Failure modes for the A1 configuration document.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A configured path does not exist, or is a file where a directory
    /// was expected (or vice versa).
    #[error("{path}: not found")]
    #[diagnostic(code(config::not_found))]
    NotFound {
        /// The offending path.
        path: PathBuf,
    },

    /// A config file exists but is not valid JSON.
    #[error("{path}: invalid JSON: {message}")]
    #[diagnostic(code(config::invalid_json))]
    InvalidJson {
        /// The file that failed to parse.
        path: PathBuf,
        /// The underlying parser message.
        message: String,
    },

    /// A field holds a value outside its documented range or set.
    #[error("{field}: {message}")]
    #[diagnostic(code(config::invalid_value), help("{hint:?}"))]
    InvalidValue {
        /// The offending key, e.g. `worker_pool_size`.
        field: String,
        /// What was wrong with it.
        message: String,
        /// An optional suggestion.
        hint: Option<String>,
    },

    /// A numeric field fell outside its documented bounds.
    #[error("{field}: {value} is out of range ({min}..={max})")]
    #[diagnostic(code(config::out_of_range))]
    OutOfRange {
        /// The offending key.
        field: String,
        /// The value supplied.
        value: i64,
        /// Minimum accepted value, inclusive.
        min: i64,
        /// Maximum accepted value, inclusive.
        max: i64,
    },

    /// An `APM_*` environment variable held an unparseable value.
    #[error("environment variable {var}: {message}")]
    #[diagnostic(code(config::env_error))]
    EnvError {
        /// The variable name.
        var: String,
        /// What was wrong with its value.
        message: String,
    },

    /// Reading or writing a config file failed below the JSON layer.
    #[error("{path}: {message}")]
    #[diagnostic(code(config::io))]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The OS-reported failure.
        message: String,
    },

    /// One or more [`crate::validate::ValidationIssue`]s reached `Error`
    /// severity.
    #[error("{count} configuration error(s)")]
    #[diagnostic(code(config::validation_failed))]
    ValidationFailed {
        /// How many issues were at `Error` severity.
        count: usize,
        /// Rendered `field: message` lines, one per issue.
        errors: Vec<String>,
    },

    /// Anything else.
    #[error("{0}")]
    #[diagnostic(code(config::other))]
    Other(String),
}

impl ConfigError {
    /// Build a [`ConfigError::Io`] (or `NotFound`) from a path and the
    /// `io::Error` that occurred while accessing it.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io {
                path,
                message: err.to_string(),
            }
        }
    }

    /// Build a [`ConfigError::InvalidJson`] from a path and a `sonic_rs`
    /// parse error.
    #[must_use]
    pub fn json(path: impl Into<PathBuf>, err: &sonic_rs::Error) -> Self {
        Self::InvalidJson {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Build a [`ConfigError::InvalidValue`] with an optional hint.
    #[must_use]
    pub fn invalid_value(
        field: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
            hint,
        }
    }

    /// Build a [`ConfigError::OutOfRange`].
    #[must_use]
    pub fn out_of_range(field: impl Into<String>, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value,
            min,
            max,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

/// Every configuration failure is reported to the rest of the workspace as
/// the shared taxonomy's `InvalidParameters` kind, so the CLI's
/// `--format json` rendering still carries the detail in its message.
impl From<ConfigError> for apm_core::Error {
    fn from(err: ConfigError) -> Self {
        apm_core::Error::invalid_parameters(err.to_string())
    }
}

/// Convenience alias for fallible operations inside this crate.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err = ConfigError::io("/etc/apm/config.json", &io_err);
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn converts_to_core_invalid_parameters() {
        let err = ConfigError::invalid_value("worker_pool_size", "must be nonzero", None);
        let core_err: apm_core::Error = err.into();
        assert_eq!(core_err.code(), "E-PARAMS");
    }
}
