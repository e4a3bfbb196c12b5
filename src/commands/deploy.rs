//! Deploy command: resolve conflicts, confirm, apply.
use anyhow::Result;

use crate::cli::DeployOpts;
use crate::config::{Environment, RootArgs};
use crate::engine::apply::{Applier, CancelFlag, Report};
use crate::engine::plan::Plan;
use crate::engine::render;
use crate::engine::resolve::{DecisionSource, Policy, PromptDecisions};
use crate::error::{ApplyError, DotlinkError};
use crate::logging::{Log, Logger, RunMode};

/// Asks the operator for a final go-ahead before anything is changed.
#[cfg_attr(test, mockall::automock)]
pub trait Confirmation {
    /// Return `true` to proceed.
    ///
    /// # Errors
    ///
    /// Returns an error if no answer can be obtained.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Confirms on the terminal; Escape counts as "no".
#[derive(Debug, Default)]
pub struct PromptConfirmation;

impl Confirmation for PromptConfirmation {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact_opt()?
            .unwrap_or(false))
    }
}

/// Always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmation(pub bool);

impl Confirmation for FixedConfirmation {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(self.0)
    }
}

/// Behaviour switches for one deploy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployFlags {
    /// Report what would happen without touching anything.
    pub dry_run: bool,
    /// Accept every conflict and skip confirmation.
    pub yes: bool,
}

/// Run the deploy command.
///
/// # Errors
///
/// Returns an error if validation fails, the operator declines, or applying
/// the plan fails partway.
pub fn run(opts: &DeployOpts, log: &Logger, cancel: CancelFlag) -> Result<()> {
    let setup = super::CommandSetup::init(
        &RootArgs::from(&opts.roots),
        &Environment::capture(),
        if opts.dry_run {
            RunMode::DryRun
        } else {
            RunMode::Apply
        },
        log,
    )?;
    let flags = DeployFlags {
        dry_run: opts.dry_run,
        yes: opts.yes,
    };
    let applier = Applier::new(log).with_cancel(cancel);
    execute(
        setup.plan,
        flags,
        &mut PromptDecisions,
        &mut PromptConfirmation,
        &applier,
        log,
    )?;
    log.print_log_location();
    Ok(())
}

/// Resolve, confirm and apply an already scanned plan.
///
/// A dry run previews every conflict as accepted and never prompts.
///
/// # Errors
///
/// Returns [`DotlinkError::Declined`] if the operator declines,
/// [`DotlinkError::Apply`] if applying fails, or the decision source's error.
pub fn execute(
    plan: Plan,
    flags: DeployFlags,
    decisions: &mut dyn DecisionSource,
    confirm: &mut dyn Confirmation,
    applier: &Applier<'_>,
    log: &dyn Log,
) -> Result<Report> {
    if plan.is_converged() {
        log.info("destination is up to date");
        return Ok(Report::default());
    }

    log.stage("Planned changes");
    super::log_plan(&plan, log);

    let mut policy = if flags.yes || flags.dry_run {
        Policy::AutoApprove
    } else {
        log.stage("Resolving conflicts");
        Policy::Ask(decisions)
    };
    let plan = plan.resolve(&mut policy)?;

    if let Some(warning) = render::adoption_warning(&plan) {
        log.warn(&warning);
    }

    if !plan.has_work() {
        log_unresolved(&plan, log);
        log.info("nothing to apply");
        return Ok(Report::default());
    }

    if !flags.dry_run && !flags.yes && !confirm.confirm("Apply these changes?")? {
        return Err(DotlinkError::Declined.into());
    }

    log.stage(if flags.dry_run {
        "Previewing changes"
    } else {
        "Applying changes"
    });
    match applier.apply(&plan, flags.dry_run) {
        Ok(report) => {
            log_unresolved(&plan, log);
            log.info(&render::report_summary(&report, flags.dry_run));
            Ok(report)
        }
        Err(err) => {
            log.error(&format!("partial result: {}", err.report()));
            if let ApplyError::Elevation { source, .. } = &err {
                log.error(&format!("to finish, run: {}", source.command()));
            }
            log.info("re-run deploy to pick up the remaining work");
            Err(DotlinkError::Apply(err).into())
        }
    }
}

fn log_unresolved(plan: &Plan, log: &dyn Log) {
    for line in render::unresolved_lines(plan) {
        log.warn(&line);
    }
}
