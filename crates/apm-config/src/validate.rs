//! Structural validation of a resolved A1 document, beyond what parsing
//! alone can check (e.g. a `worker_pool_size` of zero parses fine but is
//! nonsensical).

use crate::error::{ConfigError, Result};
use crate::types::ResolvedConfig;
use std::time::Duration;

/// How serious a [`ValidationIssue`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Worth surfacing, doesn't block the run.
    Info,
    /// Unusual but not structurally invalid.
    Warning,
    /// Structurally invalid; the run cannot proceed.
    Error,
}

/// A single validation finding.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// How serious this finding is.
    pub severity: Severity,
    /// A stable code, e.g. `config.worker_pool_size.zero`.
    pub code: &'static str,
    /// The offending field.
    pub field: String,
    /// A human-readable description.
    pub message: String,
    /// An optional suggested fix.
    pub hint: Option<String>,
}

impl ValidationIssue {
    /// Construct an `Error`-severity issue.
    #[must_use]
    pub fn error(code: &'static str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            field: field.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Construct a `Warning`-severity issue.
    #[must_use]
    pub fn warning(code: &'static str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            field: field.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a suggested fix.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// The accumulated findings from one validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Every issue found, in the order they were raised.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// An empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Merge another result's findings into this one.
    pub fn extend(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
    }

    /// Whether any finding reached `Error` severity.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Whether any finding reached `Warning` severity or above.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity >= Severity::Warning)
    }

    /// How many findings reached `Error` severity.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Error).count()
    }

    /// Fail with [`ConfigError::ValidationFailed`] if any finding reached
    /// `Error` severity, otherwise succeed.
    pub fn into_result(self) -> Result<()> {
        if self.has_errors() {
            let errors = self
                .issues
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .map(|i| format!("{}: {}", i.field, i.message))
                .collect();
            return Err(ConfigError::ValidationFailed {
                count: self.error_count(),
                errors,
            });
        }
        Ok(())
    }
}

/// Validates a [`ResolvedConfig`] against the structural constraints
/// SPEC_FULL's A1 field list implies: bounds on numeric fields, sane
/// timeouts, and internal consistency.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    /// When `true`, warnings are promoted to errors.
    strict: bool,
}

impl Validator {
    /// A default, non-strict validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Promote warnings to errors.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Validate a resolved configuration.
    #[must_use]
    pub fn validate(&self, config: &ResolvedConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.worker_pool_size == 0 {
            result.add(
                ValidationIssue::error(
                    "config.worker_pool_size.zero",
                    "worker_pool_size",
                    "must be at least 1",
                )
                .with_hint("set worker_pool_size to a positive integer, e.g. 20".to_string()),
            );
        } else if config.worker_pool_size > 256 {
            result.add(ValidationIssue::warning(
                "config.worker_pool_size.large",
                "worker_pool_size",
                format!("{} workers is unusually large", config.worker_pool_size),
            ));
        }

        if config.lock_timeout.is_zero() {
            result.add(ValidationIssue::warning(
                "config.lock_timeout.zero",
                "lock_timeout",
                "a zero lock timeout means every contended run fails immediately",
            ));
        } else if config.lock_timeout > Duration::from_secs(3600) {
            result.add(ValidationIssue::warning(
                "config.lock_timeout.large",
                "lock_timeout",
                "lock timeouts over an hour usually indicate a misconfiguration",
            ));
        }

        if !config.cache_dir.is_absolute() {
            result.add(ValidationIssue::error(
                "config.cache_dir.relative",
                "cache_dir",
                format!("'{}' must be an absolute path", config.cache_dir.display()),
            ));
        }
        if !config.image_history_dir.is_absolute() {
            result.add(ValidationIssue::error(
                "config.image_history_dir.relative",
                "image_history_dir",
                format!(
                    "'{}' must be an absolute path",
                    config.image_history_dir.display()
                ),
            ));
        }

        if self.strict {
            for issue in &mut result.issues {
                if issue.severity == Severity::Warning {
                    issue.severity = Severity::Error;
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResolvedConfig;
    use std::path::PathBuf;

    #[test]
    fn default_config_is_valid() {
        let result = Validator::new().validate(&ResolvedConfig::default());
        assert!(!result.has_errors());
    }

    #[test]
    fn zero_worker_pool_is_an_error() {
        let config = ResolvedConfig {
            worker_pool_size: 0,
            ..ResolvedConfig::default()
        };
        let result = Validator::new().validate(&config);
        assert!(result.has_errors());
    }

    #[test]
    fn relative_cache_dir_is_an_error() {
        let config = ResolvedConfig {
            cache_dir: PathBuf::from("relative/cache"),
            ..ResolvedConfig::default()
        };
        let result = Validator::new().validate(&config);
        assert!(result.has_errors());
    }

    #[test]
    fn strict_mode_promotes_warnings() {
        let config = ResolvedConfig {
            lock_timeout: Duration::ZERO,
            ..ResolvedConfig::default()
        };
        let lenient = Validator::new().validate(&config);
        let strict = Validator::new().strict(true).validate(&config);
        assert!(!lenient.has_errors());
        assert!(strict.has_errors());
    }

    #[test]
    fn into_result_fails_on_errors() {
        let mut result = ValidationResult::new();
        result.add(ValidationIssue::error("x", "field", "bad"));
        assert!(result.into_result().is_err());
    }
}
