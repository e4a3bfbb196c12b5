//! Status command: show the plan without resolving or applying it.
use anyhow::Result;

use crate::cli::StatusOpts;
use crate::config::{Environment, RootArgs};
use crate::engine::plan::Plan;
use crate::logging::{Log, Logger, RunMode};

/// Run the status command.
///
/// # Errors
///
/// Returns an error if the roots or ignore patterns are invalid.
pub fn run(opts: &StatusOpts, log: &Logger) -> Result<()> {
    let setup = super::CommandSetup::init(
        &RootArgs::from(&opts.roots),
        &Environment::capture(),
        RunMode::ReadOnly,
        log,
    )?;
    report(&setup.plan, log);
    Ok(())
}

/// Log the outstanding work in `plan`.
pub fn report(plan: &Plan, log: &dyn Log) {
    if plan.is_converged() {
        log.info("destination is up to date");
        return;
    }
    log.stage("Outstanding changes");
    super::log_plan(plan, log);
    let conflicts = plan.pending_conflicts().len();
    if conflicts > 0 {
        log.info(&format!(
            "{conflicts} conflict(s) need a decision; run deploy to resolve them"
        ));
    }
}
