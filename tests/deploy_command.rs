#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `deploy` flow and its exit codes.

mod common;

use std::fs;

use common::TestTrees;
use dotlink::commands::deploy::{self, DeployFlags, FixedConfirmation};
use dotlink::config::{Config, Environment, RootArgs};
use dotlink::engine::apply::{Applier, CancelFlag, Report};
use dotlink::engine::build_plan;
use dotlink::engine::privilege::InProcessExecutor;
use dotlink::engine::resolve::ScriptedDecisions;
use dotlink::error::{self, ApplyError, DotlinkError};
use dotlink::logging::MemoryLog;

fn execute(
    trees: &TestTrees,
    flags: DeployFlags,
    confirm: bool,
    cancel: CancelFlag,
) -> anyhow::Result<Report> {
    let log = MemoryLog::new();
    let executor = InProcessExecutor::new(cancel.clone());
    let applier = Applier::new(&log)
        .with_executor(&executor)
        .with_cancel(cancel);
    deploy::execute(
        trees.plan(),
        flags,
        &mut ScriptedDecisions::default(),
        &mut FixedConfirmation(confirm),
        &applier,
        &log,
    )
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn missing_root_is_a_validation_failure() {
    let trees = TestTrees::new();
    let err = build_plan(&trees.source, &trees.dest.join("nope"), Vec::<String>::new())
        .map_err(anyhow::Error::from)
        .unwrap_err();
    assert_eq!(error::exit_code(&err), error::EXIT_VALIDATION);
}

#[test]
fn malformed_pattern_is_a_validation_failure() {
    let trees = TestTrees::new();
    let err = build_plan(&trees.source, &trees.dest, ["bad pattern"])
        .map_err(DotlinkError::from)
        .map_err(anyhow::Error::from)
        .unwrap_err();
    assert_eq!(error::exit_code(&err), error::EXIT_VALIDATION);
}

#[test]
fn config_collects_patterns_from_ignore_file() {
    let trees = TestTrees::new().source_file(".dotlinkignore", "# comment\n\nREADME.md\n");
    let args = RootArgs {
        source: Some(trees.source.clone()),
        dest: Some(trees.dest.clone()),
        ignore: Vec::new(),
    };
    let config = Config::load(&args, &Environment::default()).unwrap();
    assert_eq!(config.patterns, vec!["README.md"]);
}

// ---------------------------------------------------------------------------
// Confirmation and cancellation
// ---------------------------------------------------------------------------

#[test]
fn declined_exits_with_declined_code() {
    let trees = TestTrees::new().source_file("cfg/app.toml", "");
    let err = execute(&trees, DeployFlags::default(), false, CancelFlag::new()).unwrap_err();
    assert_eq!(error::exit_code(&err), error::EXIT_DECLINED);
    assert!(!trees.dest.join("cfg").exists());
}

#[test]
fn cancelled_run_reports_partial_progress() {
    let trees = TestTrees::new().source_file("cfg/app.toml", "");
    let cancel = CancelFlag::new();
    cancel.cancel();
    let flags = DeployFlags {
        dry_run: false,
        yes: true,
    };
    let err = execute(&trees, flags, true, cancel).unwrap_err();
    assert_eq!(error::exit_code(&err), error::EXIT_CANCELLED);
    let apply_err = err
        .chain()
        .find_map(|e| e.downcast_ref::<DotlinkError>())
        .unwrap();
    assert!(matches!(
        apply_err,
        DotlinkError::Apply(ApplyError::Cancelled { .. })
    ));
    assert!(!trees.dest.join("cfg").exists());
}

#[test]
fn occupied_folder_slot_is_partial_failure() {
    let trees = TestTrees::new()
        .source_file("cfg/app.toml", "")
        .dest_file("cfg", "a file where a folder belongs");
    let flags = DeployFlags {
        dry_run: false,
        yes: true,
    };
    let err = execute(&trees, flags, true, CancelFlag::new()).unwrap_err();
    assert_eq!(error::exit_code(&err), error::EXIT_PARTIAL_APPLY);
    assert_eq!(
        fs::read_to_string(trees.dest.join("cfg")).unwrap(),
        "a file where a folder belongs"
    );
}

#[test]
fn dry_run_matches_live_counts() {
    let trees = TestTrees::new()
        .source_file("a/b", "")
        .source_file("c", "")
        .dest_file("c", "local");
    let preview = execute(
        &trees,
        DeployFlags {
            dry_run: true,
            yes: false,
        },
        false,
        CancelFlag::new(),
    )
    .unwrap();
    assert!(!trees.dest.join("a").exists());

    #[cfg(unix)]
    {
        let live = execute(
            &trees,
            DeployFlags {
                dry_run: false,
                yes: true,
            },
            true,
            CancelFlag::new(),
        )
        .unwrap();
        assert_eq!(preview, live);
    }
}
