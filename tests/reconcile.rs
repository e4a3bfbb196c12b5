#![cfg(unix)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! End-to-end reconciliation: scan, resolve, apply, and re-scan.
//!
//! Links are created with the in-process executor, so these tests only run
//! where an unprivileged process may create symbolic links.

mod common;

use std::collections::HashSet;
use std::fs;

use common::TestTrees;
use dotlink::engine::apply::Report;
use dotlink::engine::classify::PlanItem;
use dotlink::engine::resolve::{Decision, Policy};

fn labels(items: &[PlanItem]) -> Vec<String> {
    items
        .iter()
        .map(|i| format!("{} {}", i.label(), i.relative()))
        .collect()
}

fn assert_converged(trees: &TestTrees) {
    let plan = trees.plan();
    let outstanding: Vec<_> = plan.items().iter().filter(|i| i.is_actionable()).collect();
    assert!(outstanding.is_empty(), "not converged: {outstanding:?}");
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// Empty destination: one folder, one link.
#[test]
fn scenario_fresh_destination() {
    let trees = TestTrees::new().source_file("a/b.txt", "hello");

    let plan = trees.plan();
    assert_eq!(
        labels(plan.items()),
        vec!["create folder a", "create link a/b.txt"]
    );

    let report = common::apply(&plan.resolve(&mut Policy::AutoApprove).unwrap());
    assert_eq!(report.folders_created, 1);
    assert_eq!(report.links_created, 1);
    assert!(trees.dest.join("a").is_dir());
    assert!(!trees.dest.join("a").is_symlink());
    assert!(trees.is_linked("a/b.txt"));
    assert_eq!(trees.read_dest("a/b.txt"), "hello");
}

/// A real file in the way, rejected: nothing changes.
#[test]
fn scenario_rejected_adoption_leaves_destination_unchanged() {
    let trees = TestTrees::new()
        .source_file("notes.txt", "source copy")
        .dest_file("notes.txt", "local edits");

    assert!(matches!(trees.plan().items()[0], PlanItem::AdoptConflict(_)));

    let report = trees.deploy_with(&[Decision::Reject]);
    assert!(report.is_empty());
    assert!(!trees.dest.join("notes.txt").is_symlink());
    assert_eq!(trees.read_dest("notes.txt"), "local edits");
    assert_eq!(trees.read_source("notes.txt"), "source copy");
}

/// A real file in the way, accepted: its bytes move into the source.
#[test]
fn scenario_accepted_adoption_round_trip() {
    let trees = TestTrees::new()
        .source_file("notes.txt", "source copy")
        .dest_file("notes.txt", "local edits");

    let report = trees.deploy_with(&[Decision::Accept]);
    assert_eq!(report.adoptions_applied, 1);
    assert_eq!(report.links_created, 1);
    assert_eq!(trees.read_source("notes.txt"), "local edits");
    assert!(trees.is_linked("notes.txt"));
    assert_converged(&trees);
}

/// An adopted directory replaces the source file and becomes the link target.
#[test]
fn adopting_a_directory_moves_the_whole_tree() {
    let trees = TestTrees::new()
        .source_file("vim", "placeholder")
        .dest_file("vim/vimrc", "set nu");

    trees.deploy_all();
    assert!(trees.source.join("vim").is_dir());
    assert_eq!(trees.read_source("vim/vimrc"), "set nu");
    assert!(trees.is_linked("vim"));

    let plan = trees.plan();
    assert!(plan.warnings().is_empty(), "{:?}", plan.warnings());
    assert_converged(&trees);
    assert_eq!(trees.deploy_all(), Report::default());
}

/// Ignored subtree produces no work at all.
#[test]
fn scenario_ignored_subtree() {
    let trees = TestTrees::new()
        .ignore("secrets/")
        .source_file("secrets/key.txt", "k")
        .source_file("bashrc", "");

    let plan = trees.plan();
    let links: Vec<&str> = plan
        .links_to_create()
        .iter()
        .map(|op| op.relative.as_str())
        .collect();
    assert_eq!(links, vec!["bashrc"]);
    assert!(
        plan.folders_to_create()
            .iter()
            .all(|op| !op.relative.as_str().starts_with("secrets/"))
    );

    trees.deploy_all();
    assert!(!trees.dest.join("secrets/key.txt").exists());
}

/// Two back-to-back runs: the second has nothing to do.
#[test]
fn scenario_second_run_is_empty() {
    let trees = TestTrees::new()
        .source_file(".bashrc", "")
        .source_file(".config/git/config", "")
        .source_file(".config/nvim/init.lua", "");

    let first = trees.deploy_all();
    assert_eq!(first.links_created, 3);

    let plan = trees.plan();
    assert!(plan.is_converged());
    assert!(!plan.has_work());
    assert_eq!(trees.deploy_all(), Report::default());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// After applying with every conflict accepted, a fresh scan has no work.
#[test]
fn apply_then_rescan_is_idempotent() {
    let old_target = tempfile::NamedTempFile::new().unwrap();
    let trees = TestTrees::new()
        .source_file("a/one", "1")
        .source_file("a/b/two", "2")
        .source_file("three", "3")
        .source_file("four", "4")
        .dest_file("three", "local")
        .dest_link("four", old_target.path());

    let report = trees.deploy_all();
    assert_eq!(report.folders_created, 2);
    assert_eq!(report.adoptions_applied, 1);
    assert_eq!(report.conflicts_fixed, 1);
    assert_eq!(report.links_created, 4);
    assert_converged(&trees);
    // Relinking removes the link only, never its old target.
    assert!(old_target.path().exists());
}

/// Every source entry yields exactly one plan item.
#[test]
fn one_item_per_source_entry() {
    let trees = TestTrees::new()
        .ignore("*.bak")
        .source_dir("empty")
        .source_file("x/y/z", "")
        .source_file("x/keep", "")
        .source_file("x/old.bak", "")
        .dest_file("x/keep", "occupied");

    let plan = trees.plan();
    let rels: Vec<&str> = plan.items().iter().map(|i| i.relative().as_str()).collect();
    let unique: HashSet<&str> = rels.iter().copied().collect();
    assert_eq!(rels.len(), unique.len(), "duplicate items: {rels:?}");

    let mut expected = vec!["empty", "x", "x/y", "x/y/z", "x/keep", "x/old.bak"];
    expected.sort_unstable();
    let mut got = rels.clone();
    got.sort_unstable();
    assert_eq!(got, expected);
}

/// An ignored path stays ignored whatever occupies its destination slot.
#[test]
fn ignored_regardless_of_destination_state() {
    let elsewhere = tempfile::NamedTempFile::new().unwrap();
    let trees = TestTrees::new()
        .ignore("private")
        .source_file("private-a", "")
        .source_file("private-b", "")
        .source_file("private-c", "")
        .dest_file("private-b", "real")
        .dest_link("private-c", elsewhere.path());

    for item in trees.plan().items() {
        assert!(
            matches!(item, PlanItem::Ignored { .. }),
            "{} should be ignored, got {}",
            item.relative(),
            item.label()
        );
    }
}

/// Rejected link conflicts keep the old link in place.
#[test]
fn rejected_relink_keeps_old_link() {
    let old = tempfile::NamedTempFile::new().unwrap();
    let trees = TestTrees::new()
        .source_file("gitconfig", "")
        .dest_link("gitconfig", old.path());

    trees.deploy_with(&[Decision::Reject]);
    assert_eq!(
        fs::read_link(trees.dest.join("gitconfig")).unwrap(),
        old.path()
    );
}

/// Links in the source tree are never followed or mirrored.
#[test]
fn source_links_are_skipped_with_warning() {
    let trees = TestTrees::new().source_file("real", "");
    std::os::unix::fs::symlink(trees.source.join("real"), trees.source.join("alias")).unwrap();

    let plan = trees.plan();
    assert_eq!(plan.items().len(), 1);
    assert_eq!(plan.warnings().len(), 1);
}
