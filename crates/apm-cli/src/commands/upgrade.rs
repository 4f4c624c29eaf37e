//! `apm upgrade [--apply]`.
//!
//! `apm_planner::simulate_dist_upgrade` always restores Mark State before
//! returning, so it can only ever preview. The `ChangeSet` it returns is
//! self-contained (package names, not marks), so materializing it under
//! `--apply` is just handing that same plan to the Execution Driver.

use crate::app::App;
use crate::commands::{confirm, needs_confirmation, print_change_set};
use apm_core::Result;
use apm_executor::{ExecutionDriver, ExecutorBackend, NullObserver};
use apm_lock::LockGuard;
use apm_planner::{simulate_dist_upgrade, MarkState};

pub async fn run(app: &App, apply: bool) -> Result<()> {
    let ctx = app.context();
    let universe = app.open_universe()?;
    let view = universe.view();
    let mut marks = MarkState::new();

    let plan = simulate_dist_upgrade(&view, &mut marks, &ctx)?;

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
