//! One module per subcommand (§6), dispatched from `main.rs`.

mod autoremove;
mod image;
mod install;
mod lock;
mod reinstall;
mod remove;
mod show;
mod upgrade;

use crate::app::App;
use crate::cli::Command;
use crate::output::OutputFormat;
use apm_core::Result;
use apm_planner::ChangeSet;

/// Runs the subcommand the user invoked, printing its result in the
/// resolved output format.
///
/// # Errors
/// Returns whatever the underlying Planner, Execution Driver, Image
/// Reconciler, or Lock Guard call returned.
pub async fn dispatch(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Install {
            specs,
            purge,
            remove_depends,
            apply,
        } => install::run(app, &specs, purge, remove_depends, apply).await,
        Command::Remove {
            specs,
            purge,
            remove_depends,
            apply,
        } => remove::run(app, &specs, purge, remove_depends, apply).await,
        Command::Reinstall { specs, apply } => reinstall::run(app, &specs, apply).await,
        Command::Upgrade { apply } => upgrade::run(app, apply).await,
        Command::Autoremove { apply } => autoremove::run(app, apply).await,
        Command::Image { command } => image::run(app, command).await,
        Command::Lock { command } => lock::run(app, command),
        Command::Show { name } => show::run(app, &name),
    }
}

/// Prints a computed or materialized [`ChangeSet`], in the run's resolved
/// output format.
pub(crate) fn print_change_set(app: &App, plan: &ChangeSet) {
    match app.format {
        OutputFormat::Human => print!("{}", crate::output::render_change_set(plan)),
        OutputFormat::Json => {
            let json = apm_core::to_json_pretty(plan).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
    }
}

/// Whether a plan is worth asking the user to confirm: non-empty and not
/// already forced past the prompt by `--yes`.
pub(crate) fn needs_confirmation(app: &App, plan: &ChangeSet) -> bool {
    !app.assume_yes && *plan != ChangeSet::default()
}

/// Prompts "proceed? [y/N]" on a human terminal; always `true` under
/// `--format json` (a non-interactive caller has no prompt to answer).
pub(crate) fn confirm(app: &App, prompt: &str) -> Result<bool> {
    if app.format == OutputFormat::Json {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| apm_core::Error::operation_failed(e.to_string()))
}
