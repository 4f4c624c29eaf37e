//! Shared per-invocation wiring: resolve the layered configuration (A1),
//! derive the paths every command needs, and open the Universe/executor
//! backend commands plan and execute against.

use crate::backend::FileBackend;
use crate::cli::Cli;
use crate::output::OutputFormat;
use apm_config::{CliOverrides, ConfigLoader, LogFormat, ResolvedConfig};
use apm_core::{Context, Result};
use apm_universe::Universe;
use std::path::PathBuf;

/// Resolved configuration plus the handful of CLI-only flags
/// (`--format`, `--no-color`, `--yes`) a command needs directly.
pub struct App {
    pub resolved: ResolvedConfig,
    pub format: OutputFormat,
    pub color: bool,
    pub assume_yes: bool,
    state_dir: PathBuf,
}

/// Root directory the Universe backing-store snapshot and lock file live
/// under. `APM_STATE_DIR` overrides platform discovery, the same way
/// every other `APM_*` variable overrides its config field — useful for
/// pointing a run (or a test) at an isolated directory instead of the
/// shared platform default.
fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("APM_STATE_DIR") {
        return PathBuf::from(dir);
    }
    directories::ProjectDirs::from("", "", "apm")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/var/lib/apm"))
}

impl App {
    /// Loads every configuration layer (defaults, system file, user file
    /// or `--config`, environment, CLI flags) and resolves the CLI-only
    /// overrides on top.
    ///
    /// # Errors
    /// Returns whatever [`ConfigLoader::resolve`] returned, converted to
    /// the shared error type.
    pub fn load(cli: &Cli) -> Result<Self> {
        let overrides = CliOverrides {
            log_format: cli.format.as_deref().and_then(LogFormat::parse),
            verbosity: cli.verbose,
            no_color: cli.no_color,
            assume_yes: cli.yes,
        };

        let resolved = ConfigLoader::new().resolve(cli.config.as_deref(), &overrides)?;

        let format = resolved.log_format.into();
        let color = crate::output::color_enabled(resolved.color);

        Ok(Self {
            assume_yes: cli.yes,
            format,
            color,
            state_dir: default_state_dir(),
            resolved,
        })
    }

    /// Path to the JSON catalog [`FileBackend`] reads and writes.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.state_dir.join("catalog.json")
    }

    /// The per-invocation [`Context`] every Planner/Execution Driver call
    /// takes, rooted at this run's state directory.
    #[must_use]
    pub fn context(&self) -> Context {
        self.resolved.to_context(&self.state_dir)
    }

    /// Opens a fresh [`Universe`] snapshot over the on-disk catalog.
    ///
    /// # Errors
    /// Propagates [`FileBackend::open`]'s and the initial snapshot's
    /// errors.
    pub fn open_universe(&self) -> Result<Universe<FileBackend>> {
        Universe::open(FileBackend::open(self.catalog_path())?)
    }

    /// Opens a fresh catalog handle for the Execution Driver to install
    /// against. Deliberately independent from [`Self::open_universe`]'s
    /// handle: the driver only runs after a plan has already been
    /// computed, and reopening re-reads whatever the planning phase saw.
    ///
    /// # Errors
    /// Propagates [`FileBackend::open`]'s errors.
    pub fn open_backend(&self) -> Result<FileBackend> {
        FileBackend::open(self.catalog_path())
    }

    /// Root directory image history/config state lives under.
    #[must_use]
    pub fn image_state_dir(&self) -> PathBuf {
        self.resolved.image_history_dir.clone()
    }

    /// Path to the process-wide exclusion lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("apm.lck")
    }
}
