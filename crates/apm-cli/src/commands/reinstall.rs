//! `apm reinstall <specs...> [--apply]`.

use crate::app::App;
use crate::commands::{confirm, needs_confirmation, print_change_set};
use apm_core::{RequirementSpec, Result};
use apm_executor::{ExecutionDriver, ExecutorBackend, NullObserver};
use apm_lock::LockGuard;
use apm_planner::{plan_change, MarkState};

pub async fn run(app: &App, specs: &[RequirementSpec], apply: bool) -> Result<()> {
    let ctx = app.context();
    let universe = app.open_universe()?;
    let view = universe.view();
    let mut marks = MarkState::new();

    let plan = plan_change(&view, &mut marks, &ctx, &[], specs, &[], false, false, apply)?;

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
