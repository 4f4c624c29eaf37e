//! The top-level `clap` argument surface (§6): one subcommand per
//! Planner/Execution Driver/Image Reconciler/Lock entry point, plus the
//! global flags shared by all of them.

use apm_core::RequirementSpec;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Atomic package manager.
#[derive(Debug, Parser)]
#[command(name = "apm", version, about = "Atomic package manager front-end")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output framing: `human` prose/tables, or one JSON document.
    #[arg(long, global = true, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Increase log verbosity; repeatable (`-v`, `-vv`, `-vvv`).
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable ANSI color regardless of `color` config or TTY detection.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Read the user config layer from this path instead of the
    /// platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Assume "yes" to every confirmation prompt.
    #[arg(long, global = true)]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Install one or more packages.
    Install {
        /// Package specs, e.g. `vim` or `vim>=9.0`.
        specs: Vec<RequirementSpec>,
        /// Also remove configuration files for any package removed to
        /// satisfy this request.
        #[arg(long)]
        purge: bool,
        /// Also remove now-unneeded dependents.
        #[arg(long)]
        remove_depends: bool,
        /// Materialize the plan instead of only printing it.
        #[arg(long)]
        apply: bool,
    },
    /// Remove one or more packages.
    Remove {
        /// Package specs to remove.
        specs: Vec<RequirementSpec>,
        #[arg(long)]
        purge: bool,
        #[arg(long)]
        remove_depends: bool,
        #[arg(long)]
        apply: bool,
    },
    /// Reinstall one or more packages at their currently installed
    /// version.
    Reinstall {
        specs: Vec<RequirementSpec>,
        #[arg(long)]
        apply: bool,
    },
    /// Upgrade every installed package to its candidate version.
    Upgrade {
        #[arg(long)]
        apply: bool,
    },
    /// Remove auto-installed packages no longer required by anything.
    Autoremove {
        #[arg(long)]
        apply: bool,
    },
    /// Declarative image reconciliation (C7).
    Image {
        #[command(subcommand)]
        command: ImageCommand,
    },
    /// Process-wide lock status (C8).
    Lock {
        #[command(subcommand)]
        command: LockCommand,
    },
    /// Print one package's Universe entry. Read-only; not a Planner call.
    Show {
        /// Package name.
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ImageCommand {
    /// Reconcile an image's desired state against its actual package
    /// set.
    Apply {
        /// Image name.
        name: String,
        /// Path to the desired-state document.
        desired_state_file: PathBuf,
        #[arg(long)]
        apply: bool,
    },
    /// List an image's append-only reconciliation history.
    History {
        name: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Replay a previous history entry's desired state through the same
    /// reconciliation pipeline, recorded as a `Rollback` operation.
    Rollback {
        name: String,
        /// Sequence number of the history entry to replay.
        sequence: u64,
        #[arg(long)]
        apply: bool,
    },
    /// Read or write an image's saved desired-state document.
    Config {
        #[command(subcommand)]
        command: ImageConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ImageConfigCommand {
    /// Print an image's saved desired state.
    Get { name: String },
    /// Save a desired-state document for an image.
    Set {
        name: String,
        desired_state_file: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum LockCommand {
    /// Report whether the process-wide lock is currently held.
    Status,
}
