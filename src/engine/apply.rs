//! Executing a resolved plan against the filesystem.
//!
//! Operations run in four ordered steps: folders, adoptions, stale-link
//! removals, then one batch of link creations.  Each operation re-checks its
//! precondition just before acting.  A failed operation is recorded and
//! skipped; later operations still run.  Nothing is rolled back.
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::classify::LinkOp;
use super::plan::Plan;
use super::privilege::{self, LinkBatchOutcome, PrivilegedExecutor};
use crate::error::{ApplyError, Operation, OperationFailure};
use crate::logging::Log;
use crate::resources::adoption::AdoptionResource;
use crate::resources::directory::DirectoryResource;
use crate::resources::symlink::StaleLinkResource;
use crate::resources::{Applicable, ResourceChange};

/// Counts of what an apply did (or, for a dry run, would do).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    /// Destination folders created.
    pub folders_created: usize,
    /// Links created, including those replacing adopted objects and stale links.
    pub links_created: usize,
    /// Destination objects moved into the source tree.
    pub adoptions_applied: usize,
    /// Stale links replaced by correct ones.
    pub conflicts_fixed: usize,
}

impl Report {
    /// Whether nothing was changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.folders_created == 0
            && self.links_created == 0
            && self.adoptions_applied == 0
            && self.conflicts_fixed == 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} folder(s) created, {} link(s) created, {} adopted, {} conflict(s) fixed",
            self.folders_created, self.links_created, self.adoptions_applied, self.conflicts_fixed
        )
    }
}

/// Shared flag asking the applier to stop issuing operations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Applies a [`Plan`].
pub struct Applier<'a> {
    log: &'a dyn Log,
    cancel: CancelFlag,
    executor: Option<&'a dyn PrivilegedExecutor>,
}

impl fmt::Debug for Applier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Applier")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("executor", &self.executor.map(|e| e.name()))
            .finish_non_exhaustive()
    }
}

impl<'a> Applier<'a> {
    /// An applier that picks its link executor with a scratch-link capability check.
    #[must_use]
    pub fn new(log: &'a dyn Log) -> Self {
        Self {
            log,
            cancel: CancelFlag::new(),
            executor: None,
        }
    }

    /// Observe `cancel` before every operation.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Create links with `executor` instead of probing.
    #[must_use]
    pub fn with_executor(mut self, executor: &'a dyn PrivilegedExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Apply `plan`.
    ///
    /// With `dry_run` nothing is touched and the returned report holds the
    /// counts a live run would produce on an unchanged filesystem.
    ///
    /// # Errors
    ///
    /// - [`ApplyError::Cancelled`] if the cancel flag was set mid-run
    /// - [`ApplyError::Elevation`] if the elevated link batch failed
    /// - [`ApplyError::Partial`] if any single operation failed
    ///
    /// Every variant carries the report of what was done.
    pub fn apply(&self, plan: &Plan, dry_run: bool) -> Result<Report, ApplyError> {
        if dry_run {
            return Ok(self.preview(plan));
        }

        let mut report = Report::default();
        let mut failures = Vec::new();

        for op in plan.folders_to_create() {
            self.check_cancel(report)?;
            let resource = DirectoryResource::new(op.path.clone());
            self.log.debug(&resource.description());
            match resource.apply() {
                Ok(ResourceChange::Applied) => {
                    report.folders_created += 1;
                    self.log.info(&format!("created folder {}", op.relative));
                }
                Ok(ResourceChange::AlreadyCorrect) => {
                    self.log.debug(&format!("folder {} already exists", op.relative));
                }
                Err(e) => failures.push(self.failed(Operation::CreateFolder, op.path.clone(), &e)),
            }
        }

        let mut links: Vec<LinkOp> = plan.links_to_create().to_vec();

        for conflict in plan.resolved_adoptions() {
            self.check_cancel(report)?;
            let resource =
                AdoptionResource::new(conflict.link_path.clone(), conflict.source_path.clone());
            self.log.debug(&resource.description());
            match resource.apply() {
                Ok(_) => {
                    report.adoptions_applied += 1;
                    self.log.info(&format!(
                        "adopted {} into the source tree",
                        conflict.relative
                    ));
                    links.push(conflict.link_op());
                }
                Err(e) => failures.push(self.failed(Operation::Adopt, conflict.link_path.clone(), &e)),
            }
        }

        let mut fixed_slots: HashSet<PathBuf> = HashSet::new();
        for conflict in plan.resolved_link_fixes() {
            self.check_cancel(report)?;
            let resource =
                StaleLinkResource::new(conflict.link_path.clone(), conflict.current_target.clone());
            self.log.debug(&resource.description());
            match resource.apply() {
                Ok(_) => {
                    self.log.debug(&format!("removed stale link {}", conflict.relative));
                    fixed_slots.insert(conflict.link_path.clone());
                    links.push(conflict.link_op());
                }
                Err(e) => failures.push(self.failed(
                    Operation::RemoveStaleLink,
                    conflict.link_path.clone(),
                    &e,
                )),
            }
        }

        // Only slots that are still missing count as created.
        let pending = privilege::missing_links(&links);
        if pending.len() < links.len() {
            self.log.debug(&format!(
                "{} link(s) already in place",
                links.len() - pending.len()
            ));
        }

        if !pending.is_empty() {
            self.check_cancel(report)?;
            let outcome = match self.create_links(&pending) {
                Ok(outcome) => outcome,
                Err(source) => {
                    // Some links may exist despite the failure.
                    let outcome = privilege::verify_links(&pending);
                    self.count_links(&mut report, &outcome, &fixed_slots);
                    self.log.error(&format!("{source}"));
                    failures.extend(self.log_failures(outcome.failures));
                    return Err(ApplyError::Elevation {
                        report,
                        failures,
                        source,
                    });
                }
            };
            self.count_links(&mut report, &outcome, &fixed_slots);
            failures.extend(self.log_failures(outcome.failures));
        }

        self.check_cancel(report)?;
        if failures.is_empty() {
            Ok(report)
        } else {
            Err(ApplyError::Partial { report, failures })
        }
    }

    fn create_links(
        &self,
        links: &[LinkOp],
    ) -> Result<LinkBatchOutcome, crate::error::ElevationError> {
        let selected;
        let executor: &dyn PrivilegedExecutor = match self.executor {
            Some(executor) => executor,
            None => {
                selected = privilege::select_executor(&self.cancel, self.log)?;
                selected.as_ref()
            }
        };
        self.log.debug(&format!(
            "creating {} link(s) via {}",
            links.len(),
            executor.name()
        ));
        executor.create_links(links)
    }

    fn count_links(
        &self,
        report: &mut Report,
        outcome: &LinkBatchOutcome,
        fixed_slots: &HashSet<PathBuf>,
    ) {
        for op in &outcome.created {
            report.links_created += 1;
            if fixed_slots.contains(&op.link_path) {
                report.conflicts_fixed += 1;
            }
            self.log.info(&format!("linked {}", op.relative));
        }
    }

    fn preview(&self, plan: &Plan) -> Report {
        for op in plan.folders_to_create() {
            self.log.dry_run(&format!("would create folder {}", op.relative));
        }
        for c in plan.resolved_adoptions() {
            self.log.dry_run(&format!(
                "would move {} to {} and link it",
                c.link_path.display(),
                c.source_path.display()
            ));
        }
        for c in plan.resolved_link_fixes() {
            self.log
                .dry_run(&format!("would relink {} (was {})", c.relative, c.current_target.display()));
        }
        for op in plan.links_to_create() {
            self.log.dry_run(&format!("would link {}", op.relative));
        }
        let adoptions = plan.resolved_adoptions().len();
        let fixes = plan.resolved_link_fixes().len();
        Report {
            folders_created: plan.folders_to_create().len(),
            links_created: plan.links_to_create().len() + adoptions + fixes,
            adoptions_applied: adoptions,
            conflicts_fixed: fixes,
        }
    }

    fn check_cancel(&self, report: Report) -> Result<(), ApplyError> {
        if self.cancel.is_cancelled() {
            Err(ApplyError::Cancelled { report })
        } else {
            Ok(())
        }
    }

    fn log_failures(&self, failures: Vec<OperationFailure>) -> Vec<OperationFailure> {
        for failure in &failures {
            self.log.error(&failure.to_string());
        }
        failures
    }

    fn failed(&self, operation: Operation, path: PathBuf, err: &anyhow::Error) -> OperationFailure {
        let failure = OperationFailure::new(operation, path, format!("{err:#}"));
        self.log.error(&failure.to_string());
        failure
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::engine::ignore::IgnoreMatcher;
    use crate::engine::plan::BuildOptions;
    use crate::engine::privilege::{InProcessExecutor, MockPrivilegedExecutor};
    use crate::engine::resolve::Policy;
    use crate::error::ElevationError;
    use crate::logging::MemoryLog;
    use std::fs;
    use std::path::Path;

    struct Roots {
        _dir: tempfile::TempDir,
        source: PathBuf,
        dest: PathBuf,
    }

    fn roots() -> Roots {
        let dir = tempfile::tempdir().unwrap();
        let base = dunce::canonicalize(dir.path()).unwrap();
        let source = base.join("src");
        let dest = base.join("dst");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&dest).unwrap();
        Roots {
            _dir: dir,
            source,
            dest,
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolved_plan(r: &Roots) -> Plan {
        let ignore = IgnoreMatcher::compile(Vec::<String>::new()).unwrap();
        let options = BuildOptions {
            case_insensitive: false,
            self_path: None,
        };
        Plan::scan(&r.source, &r.dest, &ignore, &options)
            .resolve(&mut Policy::AutoApprove)
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // dry run
    // -----------------------------------------------------------------------

    #[test]
    fn dry_run_touches_nothing_and_predicts_counts() {
        let r = roots();
        write(&r.source.join("a/b.txt"), "b");
        write(&r.source.join("notes"), "src");
        write(&r.dest.join("notes"), "dst");

        let plan = resolved_plan(&r);
        let log = MemoryLog::new();
        let report = Applier::new(&log).apply(&plan, true).unwrap();

        assert_eq!(
            report,
            Report {
                folders_created: 1,
                links_created: 2,
                adoptions_applied: 1,
                conflicts_fixed: 0,
            }
        );
        assert!(!r.dest.join("a").exists());
        assert_eq!(fs::read_to_string(r.dest.join("notes")).unwrap(), "dst");
        assert!(log.contains("dry_run", "would create folder a"));
    }

    // -----------------------------------------------------------------------
    // live
    // -----------------------------------------------------------------------

    #[cfg(unix)]
    #[test]
    fn live_run_matches_dry_run_counts() {
        let r = roots();
        write(&r.source.join("a/b.txt"), "b");
        write(&r.source.join("notes"), "src");
        write(&r.dest.join("notes"), "dst");
        let stale = r.dest.join("elsewhere");
        write(&stale, "");
        write(&r.source.join("vimrc"), "v");
        std::os::unix::fs::symlink(&stale, r.dest.join("vimrc")).unwrap();

        let plan = resolved_plan(&r);
        let log = MemoryLog::new();
        let preview = Applier::new(&log).apply(&plan, true).unwrap();
        let executor = InProcessExecutor::default();
        let report = Applier::new(&log)
            .with_executor(&executor)
            .apply(&plan, false)
            .unwrap();

        assert_eq!(report, preview);
        assert_eq!(report.conflicts_fixed, 1);
        assert_eq!(
            fs::read_link(r.dest.join("vimrc")).unwrap(),
            r.source.join("vimrc")
        );
    }

    #[test]
    fn failed_operation_is_recorded_and_rest_continue() {
        let r = roots();
        write(&r.source.join("cfg/inner"), "x");
        write(&r.source.join("zz"), "z");
        // A file where the folder should go.
        write(&r.dest.join("cfg"), "blocker");

        let plan = resolved_plan(&r);
        let log = MemoryLog::new();
        let mut executor = MockPrivilegedExecutor::new();
        executor.expect_name().return_const("mock");
        executor.expect_create_links().times(1).returning(|links| {
            Ok(LinkBatchOutcome {
                created: links.to_vec(),
                failures: Vec::new(),
            })
        });

        let err = Applier::new(&log)
            .with_executor(&executor)
            .apply(&plan, false)
            .unwrap_err();
        let ApplyError::Partial { report, failures } = err else {
            panic!("expected partial failure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].operation, Operation::CreateFolder);
        assert_eq!(report.links_created, 1);
    }

    #[test]
    fn cancelled_before_start_does_nothing() {
        let r = roots();
        write(&r.source.join("a/b"), "b");
        let plan = resolved_plan(&r);

        let cancel = CancelFlag::new();
        cancel.cancel();
        let log = MemoryLog::new();
        let mut executor = MockPrivilegedExecutor::new();
        executor.expect_create_links().never();

        let err = Applier::new(&log)
            .with_cancel(cancel)
            .with_executor(&executor)
            .apply(&plan, false)
            .unwrap_err();
        assert!(matches!(err, ApplyError::Cancelled { report } if report.is_empty()));
        assert!(!r.dest.join("a").exists());
    }

    #[test]
    fn elevation_failure_carries_command_and_report() {
        let r = roots();
        write(&r.source.join("dir/file"), "f");
        let plan = resolved_plan(&r);

        let log = MemoryLog::new();
        let mut executor = MockPrivilegedExecutor::new();
        executor.expect_name().return_const("mock");
        executor.expect_create_links().returning(|_| {
            Err(ElevationError::BatchFailed {
                command: "sudo dotlink link-batch /tmp/x.json".to_string(),
                code: 1,
                detail: "denied".to_string(),
            })
        });

        let err = Applier::new(&log)
            .with_executor(&executor)
            .apply(&plan, false)
            .unwrap_err();
        let ApplyError::Elevation {
            report,
            failures,
            source,
        } = err
        else {
            panic!("expected elevation failure");
        };
        assert_eq!(report.folders_created, 1);
        assert_eq!(report.links_created, 0);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].operation, Operation::CreateLink);
        assert!(source.command().contains("link-batch"));
    }

    #[test]
    fn elevation_failure_keeps_earlier_failures() {
        let r = roots();
        write(&r.source.join("cfg/inner"), "x");
        write(&r.source.join("zz"), "z");
        write(&r.dest.join("cfg"), "blocker");
        let plan = resolved_plan(&r);

        let log = MemoryLog::new();
        let mut executor = MockPrivilegedExecutor::new();
        executor.expect_name().return_const("mock");
        executor.expect_create_links().returning(|_| {
            Err(ElevationError::BatchFailed {
                command: "sudo dotlink link-batch /tmp/x.json".to_string(),
                code: 1,
                detail: "denied".to_string(),
            })
        });

        let err = Applier::new(&log)
            .with_executor(&executor)
            .apply(&plan, false)
            .unwrap_err();
        let ApplyError::Elevation { failures, .. } = err else {
            panic!("expected elevation failure");
        };
        let operations: Vec<Operation> = failures.iter().map(|f| f.operation).collect();
        assert!(operations.contains(&Operation::CreateFolder));
        assert!(operations.contains(&Operation::CreateLink));
    }

    #[cfg(unix)]
    #[test]
    fn links_already_in_place_are_not_counted() {
        let r = roots();
        write(&r.source.join("bashrc"), "b");
        write(&r.source.join("zshrc"), "z");
        let plan = resolved_plan(&r);
        // Someone else links one slot between scan and apply.
        std::os::unix::fs::symlink(r.source.join("bashrc"), r.dest.join("bashrc")).unwrap();

        let log = MemoryLog::new();
        let mut executor = MockPrivilegedExecutor::new();
        executor.expect_name().return_const("mock");
        executor
            .expect_create_links()
            .withf(|links| links.len() == 1 && links[0].relative.as_str() == "zshrc")
            .times(1)
            .returning(|links| {
                Ok(LinkBatchOutcome {
                    created: links.to_vec(),
                    failures: Vec::new(),
                })
            });

        let report = Applier::new(&log)
            .with_executor(&executor)
            .apply(&plan, false)
            .unwrap();
        assert_eq!(report.links_created, 1);
    }

    #[test]
    fn rejected_adoption_leaves_slot_untouched() {
        let r = roots();
        write(&r.source.join("notes"), "src");
        write(&r.dest.join("notes"), "dst");

        let ignore = IgnoreMatcher::compile(Vec::<String>::new()).unwrap();
        let options = BuildOptions {
            case_insensitive: false,
            self_path: None,
        };
        let mut decisions =
            crate::engine::resolve::ScriptedDecisions::new([crate::engine::resolve::Decision::Reject]);
        let plan = Plan::scan(&r.source, &r.dest, &ignore, &options)
            .resolve(&mut Policy::Ask(&mut decisions))
            .unwrap();

        let log = MemoryLog::new();
        let mut executor = MockPrivilegedExecutor::new();
        executor.expect_create_links().never();
        let report = Applier::new(&log)
            .with_executor(&executor)
            .apply(&plan, false)
            .unwrap();

        assert!(report.is_empty());
        assert_eq!(fs::read_to_string(r.dest.join("notes")).unwrap(), "dst");
        assert_eq!(fs::read_to_string(r.source.join("notes")).unwrap(), "src");
    }

    #[test]
    fn report_display_lists_all_counts() {
        let report = Report {
            folders_created: 1,
            links_created: 2,
            adoptions_applied: 3,
            conflicts_fixed: 4,
        };
        assert_eq!(
            report.to_string(),
            "1 folder(s) created, 2 link(s) created, 3 adopted, 4 conflict(s) fixed"
        );
    }
}
