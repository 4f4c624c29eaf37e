//! `apm install <specs...> [--purge] [--remove-depends] [--apply]`.
//!
//! Calls `plan_change` directly rather than `apm_planner::simulate_install`:
//! the `simulate_*` wrappers hardcode `apply=false` and always restore the
//! prior marks, so they can only ever preview — this command needs the
//! real `--apply` flag to actually reach the Execution Driver.

use crate::app::App;
use crate::commands::{confirm, needs_confirmation, print_change_set};
use apm_core::{RequirementSpec, Result};
use apm_executor::{ExecutionDriver, ExecutorBackend, NullObserver};
use apm_lock::LockGuard;
use apm_planner::{plan_change, MarkState};

pub async fn run(
    app: &App,
    specs: &[RequirementSpec],
    purge: bool,
    remove_depends: bool,
    apply: bool,
) -> Result<()> {
    let ctx = app.context();
    let universe = app.open_universe()?;
    let view = universe.view();
    let mut marks = MarkState::new();

    let plan = plan_change(&view, &mut marks, &ctx, specs, &[], &[], purge, remove_depends, apply)?;

    print_change_set(app, &plan);

    if !apply {
        return Ok(());
    }
    if needs_confirmation(app, &plan) && !confirm(app, "proceed with these changes?")? {
        return Ok(());
    }

    let guard = LockGuard::acquire(app.lock_path(), ctx.lock_timeout)?;
    let backend = app.open_backend()?;
    let observer = NullObserver;
    let driver = ExecutionDriver::new(&backend as &dyn ExecutorBackend, &guard, &observer);
    driver.apply(&plan, &ctx).await?;
    drop(guard);

    Ok(())
}
