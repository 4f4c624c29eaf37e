//! `apm image apply|history|config get|set` (C7, §6).

use crate::app::App;
use crate::cli::{ImageCommand, ImageConfigCommand};
use crate::output::OutputFormat;
use apm_core::{Context, RequirementSpec, Result};
use apm_executor::{ExecutionDriver, ExecutorBackend, NullObserver};
use apm_image::{ChangeApplier, DesiredState, ImageReconciler, ReconcileDelta};
use apm_lock::LockGuard;
use apm_planner::{plan_change, ChangeSet, MarkState};

/// Feeds a reconciled delta through the Planner, and, when `apply` was
/// requested, through the Execution Driver. Bridges `ChangeApplier`'s
/// synchronous seam to the Driver's async `apply` with `block_in_place`,
/// since `ImageReconciler::apply_desired` itself stays synchronous.
struct PlannerApplier<'a> {
    app: &'a App,
    ctx: Context,
    apply: bool,
}

impl ChangeApplier for PlannerApplier<'_> {
    fn apply(&self, delta: &ReconcileDelta) -> Result<ChangeSet> {
        let installs: Vec<RequirementSpec> = delta
            .install
            .iter()
            .map(|spec| match &spec.version {
                Some(version) => RequirementSpec::exact(spec.name.clone(), version.clone()),
                None => RequirementSpec::any(spec.name.clone()),
            })
            .collect();
        let removes: Vec<RequirementSpec> = delta
            .remove
            .iter()
            .map(|name| RequirementSpec::any(name.clone()))
            .collect();

        let universe = self.app.open_universe()?;
        let view = universe.view();
        let mut marks = MarkState::new();
        let plan = plan_change(
            &view,
            &mut marks,
            &self.ctx,
            &installs,
            &[],
            &removes,
            false,
            false,
            self.apply,
        )?;

        if self.apply {
            let guard = LockGuard::acquire(self.app.lock_path(), self.ctx.lock_timeout)?;
            let backend = self.app.open_backend()?;
            let observer = NullObserver;
            let driver = ExecutionDriver::new(&backend as &dyn ExecutorBackend, &guard, &observer);
            tokio::task::block_in_place(|| {
                tokio::runtime::Handle::current().block_on(driver.apply(&plan, &self.ctx))
            })?;
            drop(guard);
        }

        Ok(plan)
    }
}

fn actual_installed(app: &App) -> Result<Vec<String>> {
    let universe = app.open_universe()?;
    let view = universe.view();
    Ok(view
        .iter()
        .filter(|(_, pkg)| pkg.current_version.is_some())
        .map(|(_, pkg)| pkg.name.clone())
        .collect())
}

pub async fn run(app: &App, command: ImageCommand) -> Result<()> {
    match command {
        ImageCommand::Apply {
            name,
            desired_state_file,
            apply,
        } => apply_cmd(app, &name, &desired_state_file, apply),
        ImageCommand::History { name, offset, limit } => history_cmd(app, &name, offset, limit),
        ImageCommand::Rollback { name, sequence, apply } => {
            rollback_cmd(app, &name, sequence, apply)
        }
        ImageCommand::Config { command } => match command {
            ImageConfigCommand::Get { name } => config_get(app, &name),
            ImageConfigCommand::Set {
                name,
                desired_state_file,
            } => config_set(app, &name, &desired_state_file),
        },
    }
}

fn read_desired_state(path: &std::path::Path) -> Result<DesiredState> {
    let bytes = std::fs::read(path)
        .map_err(|e| apm_core::Error::invalid_parameters(format!("{}: {e}", path.display())))?;
    apm_core::from_json_slice(&bytes)
}

fn apply_cmd(app: &App, name: &str, desired_state_file: &std::path::Path, apply: bool) -> Result<()> {
    let desired = read_desired_state(desired_state_file)?;
    let actual = actual_installed(app)?;

    let applier = PlannerApplier {
        app,
        ctx: app.context(),
        apply,
    };
    let reconciler = ImageReconciler::new(app.image_state_dir(), &applier);
    let plan = reconciler.apply_desired(name, &desired, &actual)?;

    crate::commands::print_change_set(app, &plan);
    Ok(())
}

fn rollback_cmd(app: &App, name: &str, sequence: u64, apply: bool) -> Result<()> {
    let actual = actual_installed(app)?;

    let applier = PlannerApplier {
        app,
        ctx: app.context(),
        apply,
    };
    let reconciler = ImageReconciler::new(app.image_state_dir(), &applier);
    let plan = reconciler.rollback_to(name, sequence, &actual)?;

    crate::commands::print_change_set(app, &plan);
    Ok(())
}

fn history_cmd(app: &App, name: &str, offset: usize, limit: usize) -> Result<()> {
    let applier = PlannerApplier {
        app,
        ctx: app.context(),
        apply: false,
    };
    let reconciler = ImageReconciler::new(app.image_state_dir(), &applier);
    let (entries, total) = reconciler.history(name, offset, limit)?;

    match app.format {
        OutputFormat::Json => println!("{}", apm_core::to_json_pretty(&entries)?),
        OutputFormat::Human => {
            for entry in &entries {
                println!(
                    "#{} {} {:?} {:?} install={} remove={}",
                    entry.sequence,
                    entry.timestamp,
                    entry.operation,
                    entry.outcome,
                    entry.delta.install.len(),
                    entry.delta.remove.len()
                );
            }
            println!("({total} total)");
        }
    }
    Ok(())
}

fn config_get(app: &App, name: &str) -> Result<()> {
    let applier = PlannerApplier {
        app,
        ctx: app.context(),
        apply: false,
    };
    let reconciler = ImageReconciler::new(app.image_state_dir(), &applier);
    let desired = reconciler.get_config(name)?;
    println!("{}", apm_core::to_json_pretty(&desired)?);
    Ok(())
}

fn config_set(app: &App, name: &str, desired_state_file: &std::path::Path) -> Result<()> {
    let desired = read_desired_state(desired_state_file)?;
    let applier = PlannerApplier {
        app,
        ctx: app.context(),
        apply: false,
    };
    let reconciler = ImageReconciler::new(app.image_state_dir(), &applier);
    reconciler.save_config(name, &desired)?;
    crate::output::print_heading(&format!("saved desired state for {name}"), app.color);
    Ok(())
}
