//! Subcommand entry points and their shared setup.
pub mod deploy;
pub mod link_batch;
pub mod status;
pub mod version;

use anyhow::Result;
use std::path::PathBuf;

use crate::config::{Config, Environment, RootArgs};
use crate::engine::plan::{BuildOptions, Plan};
use crate::engine::render;
use crate::logging::{Log, RunHeader, RunMode};
use crate::platform::Platform;

/// Shared state produced by the common command setup sequence.
///
/// Resolves and validates the roots, compiles ignore rules, and scans, so
/// that `deploy` and `status` start from the same plan.
#[derive(Debug)]
pub struct CommandSetup {
    /// Resolved roots, settings, and ignore patterns.
    pub config: Config,
    /// The scanned, not yet resolved plan.
    pub plan: Plan,
}

impl CommandSetup {
    /// Load configuration from `args` and `env`, log the run header for
    /// `mode`, and build the unresolved plan.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`](crate::error::ValidationError) if the
    /// roots or ignore patterns are invalid.
    pub fn init(
        args: &RootArgs,
        env: &Environment,
        mode: RunMode,
        log: &dyn Log,
    ) -> Result<Self> {
        log.stage("Loading configuration");
        log.debug(&format!("platform: {}", Platform::detect().os));
        let config = Config::load(args, env)?;
        log.header(&RunHeader {
            source: &config.source_root,
            destination: &config.destination_root,
            mode,
        });
        log.debug(&format!("{} ignore pattern(s)", config.patterns.len()));

        let warnings = config.warnings()?;
        if !warnings.is_empty() {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in &warnings {
                log.warn(&format!(
                    "  {} [{}]: {}",
                    warning.source, warning.item, warning.message
                ));
            }
        }

        let program = current_program();
        let ignore = config.ignore_matcher(program.as_deref())?;
        let options = BuildOptions {
            self_path: program,
            ..BuildOptions::default()
        };

        log.stage("Scanning source tree");
        let plan = Plan::scan(&config.source_root, &config.destination_root, &ignore, &options);
        for warning in plan.warnings() {
            log.warn(&format!("skipped: {warning}"));
        }
        log.info(&render::plan_summary(&plan));

        Ok(Self { config, plan })
    }
}

/// Canonical path of the running executable, if it can be determined.
fn current_program() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| dunce::canonicalize(exe).ok())
}

/// Log every actionable plan line at info level.
pub fn log_plan(plan: &Plan, log: &dyn Log) {
    for line in render::plan_lines(plan) {
        log.info(&line);
    }
}
