//! Loads the layered A1 configuration document and resolves it into a
//! [`ResolvedConfig`], applying each layer in increasing precedence:
//! compiled-in defaults, `/etc/apm/config.json`, `$XDG_CONFIG_HOME/apm/config.json`,
//! `APM_*` environment variables, then CLI flags.

use crate::env;
use crate::error::{ConfigError, Result};
use crate::types::{AppConfig, ColorMode, LogLevel, ResolvedConfig};
use std::path::{Path, PathBuf};

/// Which layer a piece of configuration came from, in increasing
/// precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// The compiled-in [`ResolvedConfig::default`].
    Defaults = 0,
    /// `/etc/apm/config.json` (or the platform equivalent).
    System = 1,
    /// `$XDG_CONFIG_HOME/apm/config.json`.
    User = 2,
    /// `APM_*` environment variables.
    Environment = 3,
    /// Flags parsed from `argv`.
    Cli = 4,
}

impl ConfigSource {
    /// A human-readable name for `--format json` provenance reporting.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Defaults => "compiled-in defaults",
            Self::System => "system config file",
            Self::User => "user config file",
            Self::Environment => "environment variables",
            Self::Cli => "command-line flags",
        }
    }
}

/// CLI-flag overrides, applied last. Mirrors SPEC_FULL.md's global flag
/// set (`--format`, `-v`/`-vv`/`-vvv`, `--no-color`, `--yes`); `--config`
/// is consumed before loading even starts, so it isn't represented here.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--format human|json`.
    pub log_format: Option<crate::types::LogFormat>,
    /// How many times `-v` was repeated.
    pub verbosity: u8,
    /// `--no-color`.
    pub no_color: bool,
    /// `--yes`, auto-confirm prompts; not part of [`ResolvedConfig`]
    /// itself but carried alongside for the CLI to consume.
    pub assume_yes: bool,
}

impl CliOverrides {
    /// Fold these flags into a resolution already carrying every other
    /// layer.
    pub fn apply_to(&self, resolved: &mut ResolvedConfig) {
        if let Some(format) = self.log_format {
            resolved.log_format = format;
        }
        if self.verbosity > 0 {
            resolved.log_level = resolved.log_level.raised_by(self.verbosity);
        }
        if self.no_color {
            resolved.color = ColorMode::Never;
        }
    }
}

/// Locates and merges the layered configuration document.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    system_path: Option<PathBuf>,
    user_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Build a loader using the platform's standard system and user
    /// config locations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system_path: Some(Self::default_system_path()),
            user_path: directories::ProjectDirs::from("", "", "apm")
                .map(|d| d.config_dir().join("config.json")),
        }
    }

    /// Build a loader that reads from explicit paths, bypassing platform
    /// discovery (used in tests, or when `--config` names both layers).
    #[must_use]
    pub fn with_paths(system_path: Option<PathBuf>, user_path: Option<PathBuf>) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// The platform's system-wide config path.
    #[must_use]
    pub fn default_system_path() -> PathBuf {
        if cfg!(target_os = "windows") {
            PathBuf::from(r"C:\ProgramData\apm\config.json")
        } else if cfg!(target_os = "macos") {
            PathBuf::from("/Library/Application Support/apm/config.json")
        } else {
            PathBuf::from("/etc/apm/config.json")
        }
    }

    /// Load and merge every layer, in precedence order, into a single
    /// [`ResolvedConfig`]. `explicit_path`, from `--config`, is read
    /// instead of the discovered user path when given; it does not
    /// replace the system layer.
    pub fn resolve(&self, explicit_path: Option<&Path>, cli: &CliOverrides) -> Result<ResolvedConfig> {
        let mut resolved = ResolvedConfig::default();

        if let Some(path) = &self.system_path {
            if let Some(layer) = Self::load_file(path)? {
                resolved.apply(layer);
            }
        }

        let user_path = explicit_path.map(Path::to_path_buf).or_else(|| self.user_path.clone());
        if let Some(path) = &user_path {
            if let Some(layer) = Self::load_file(path)? {
                resolved.apply(layer);
            } else if explicit_path.is_some() {
                return Err(ConfigError::NotFound { path: path.clone() });
            }
        }

        resolved.apply(env::from_env()?);
        cli.apply_to(&mut resolved);

        Ok(resolved)
    }

    /// Read and parse a config file, returning `None` if it doesn't exist.
    fn load_file(path: &Path) -> Result<Option<AppConfig>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ConfigError::io(path, &err)),
        };

        let config: AppConfig =
            sonic_rs::from_slice(&bytes).map_err(|err| ConfigError::json(path, &err))?;
        Ok(Some(config))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
