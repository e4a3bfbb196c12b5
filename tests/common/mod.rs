// Shared helpers for integration tests.
//
// Provides a temporary source/destination pair and a small builder so each
// integration test can lay out both trees without repeating filesystem
// boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use dotlink::engine::apply::{Applier, Report};
use dotlink::engine::ignore::IgnoreMatcher;
use dotlink::engine::plan::{BuildOptions, Plan};
use dotlink::engine::privilege::InProcessExecutor;
use dotlink::engine::resolve::{Decision, Policy, ScriptedDecisions};
use dotlink::logging::MemoryLog;

/// An isolated source tree and destination tree under one temp directory.
///
/// Both roots are canonical so that paths in plans compare equal to the
/// paths built here.
pub struct TestTrees {
    _tmp: tempfile::TempDir,
    pub source: PathBuf,
    pub dest: PathBuf,
    patterns: Vec<String>,
}

impl TestTrees {
    /// Create empty `src/` and `dst/` roots.
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let base = dunce::canonicalize(tmp.path()).expect("canonicalize temp dir");
        let source = base.join("src");
        let dest = base.join("dst");
        fs::create_dir(&source).expect("create source root");
        fs::create_dir(&dest).expect("create destination root");
        Self {
            _tmp: tmp,
            source,
            dest,
            patterns: Vec::new(),
        }
    }

    /// Add an ignore pattern used by [`plan`](Self::plan).
    #[must_use]
    pub fn ignore(mut self, pattern: &str) -> Self {
        self.patterns.push(pattern.to_string());
        self
    }

    /// Write a file under the source root, creating parents.
    #[must_use]
    pub fn source_file(self, rel: &str, content: &str) -> Self {
        write(&self.source.join(rel), content);
        self
    }

    /// Create a directory under the source root.
    #[must_use]
    pub fn source_dir(self, rel: &str) -> Self {
        fs::create_dir_all(self.source.join(rel)).expect("create source dir");
        self
    }

    /// Write a real file under the destination root, creating parents.
    #[must_use]
    pub fn dest_file(self, rel: &str, content: &str) -> Self {
        write(&self.dest.join(rel), content);
        self
    }

    /// Put a link at `rel` in the destination pointing to `target`.
    #[cfg(unix)]
    #[must_use]
    pub fn dest_link(self, rel: &str, target: &Path) -> Self {
        let link = self.dest.join(rel);
        if let Some(parent) = link.parent() {
            fs::create_dir_all(parent).expect("create dest parent");
        }
        std::os::unix::fs::symlink(target, &link).expect("create dest link");
        self
    }

    /// Scan with the configured ignore patterns.
    pub fn plan(&self) -> Plan {
        let ignore = IgnoreMatcher::compile(&self.patterns).expect("compile patterns");
        let options = BuildOptions {
            case_insensitive: false,
            self_path: None,
        };
        Plan::scan(&self.source, &self.dest, &ignore, &options)
    }

    /// Scan, resolve with `decisions`, and apply in-process.
    pub fn deploy_with(&self, decisions: &[Decision]) -> Report {
        let mut source = ScriptedDecisions::new(decisions.iter().copied());
        let plan = self
            .plan()
            .resolve(&mut Policy::Ask(&mut source))
            .expect("resolve");
        apply(&plan)
    }

    /// Scan, accept every conflict, and apply in-process.
    pub fn deploy_all(&self) -> Report {
        let plan = self
            .plan()
            .resolve(&mut Policy::AutoApprove)
            .expect("resolve");
        apply(&plan)
    }

    /// Read a destination file through any link.
    pub fn read_dest(&self, rel: &str) -> String {
        fs::read_to_string(self.dest.join(rel)).expect("read destination")
    }

    /// Read a source file.
    pub fn read_source(&self, rel: &str) -> String {
        fs::read_to_string(self.source.join(rel)).expect("read source")
    }

    /// Whether the destination entry at `rel` is a link to the source twin.
    pub fn is_linked(&self, rel: &str) -> bool {
        fs::read_link(self.dest.join(rel)).is_ok_and(|t| t == self.source.join(rel))
    }
}

/// Apply a resolved plan with the in-process executor.
pub fn apply(plan: &Plan) -> Report {
    let log = MemoryLog::new();
    let executor = InProcessExecutor::default();
    Applier::new(&log)
        .with_executor(&executor)
        .apply(plan, false)
        .expect("apply")
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}
