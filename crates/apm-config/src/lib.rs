//! Application Configuration (A1): the layered document a run is
//! configured by, and the [`Context`] derived from it that the other
//! components read during planning and execution.
//!
//! Four layers merge in increasing precedence: compiled-in defaults,
//! a system-wide `/etc/apm/config.json`, a user `$XDG_CONFIG_HOME/apm/config.json`,
//! `APM_*` environment variables, and finally CLI flags. See
//! [`loader::ConfigLoader::resolve`].
//!
//! ## Example
//!
//! ```no_run
//! use apm_config::{CliOverrides, ConfigLoader, Validator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = ConfigLoader::new();
//! let resolved = loader.resolve(None, &CliOverrides::default())?;
//! Validator::new().validate(&resolved).into_result()?;
//! println!("worker pool size: {}", resolved.worker_pool_size);
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod env;
mod error;
mod loader;
mod types;
mod validate;

pub use env::{parse_duration_secs, ApmEnvVar};
pub use error::{ConfigError, Result};
pub use loader::{CliOverrides, ConfigLoader, ConfigSource};
pub use types::{AppConfig, ColorMode, LogFormat, LogLevel, ResolvedConfig, UniverseBackend};
pub use validate::{Severity, ValidationIssue, ValidationResult, Validator};

// `apm_core::Context` is the per-invocation struct Planner and Execution
// Driver calls take; `ResolvedConfig::to_context` (in `types`) builds one
// from this crate's resolved document.
pub use apm_core::{CancellationToken, Context};
