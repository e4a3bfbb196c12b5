//! The reconciliation engine: scan, classify, resolve, apply.
//!
//! ```text
//! source tree ──TreeScanner──▶ ScanEntry ──Classifier──▶ PlanItem ──▶ Plan
//!                                                                      │
//!                                       DecisionSource ──resolve──────┤
//!                                                                      ▼
//!                                  Applier ──(PrivilegedExecutor)──▶ Report
//! ```
pub mod apply;
pub mod classify;
pub mod ignore;
pub mod path;
pub mod plan;
pub mod privilege;
pub mod render;
pub mod resolve;
pub mod scan;

use std::path::Path;

use crate::config::validation::validate_roots;
use crate::error::ValidationError;
use ignore::IgnoreMatcher;
use plan::{BuildOptions, Plan};

/// Validate the roots, compile `patterns`, and build an unresolved plan.
///
/// # Errors
///
/// Returns a [`ValidationError`] for a missing, non-directory, identical or
/// nested root, or for a malformed ignore pattern.  Nothing is scanned when
/// validation fails.
pub fn build_plan<I, S>(
    source_root: &Path,
    destination_root: &Path,
    patterns: I,
) -> Result<Plan, ValidationError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ignore = IgnoreMatcher::compile(patterns)?;
    build_plan_with(source_root, destination_root, &ignore, &BuildOptions::default())
}

/// Like [`build_plan`] with a precompiled matcher and explicit options.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the roots are invalid.
pub fn build_plan_with(
    source_root: &Path,
    destination_root: &Path,
    ignore: &IgnoreMatcher,
    options: &BuildOptions,
) -> Result<Plan, ValidationError> {
    let (source, destination) = validate_roots(source_root, destination_root)?;
    Ok(Plan::scan(&source, &destination, ignore, options))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn bad_pattern_fails_before_scan() {
        let dir = tempfile::tempdir().unwrap();
        let err = build_plan(dir.path(), &dir.path().join("missing"), ["C:/bad"]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPattern { .. }));
    }

    #[test]
    fn missing_destination_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            build_plan(dir.path(), &dir.path().join("missing"), Vec::<String>::new()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingRoot {
                role: "destination",
                ..
            }
        ));
    }

    #[test]
    fn plan_uses_canonical_roots() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::create_dir(dir.path().join("dst")).unwrap();
        fs::write(dir.path().join("src/file"), "").unwrap();

        let plan = build_plan(
            &dir.path().join("dst/../src"),
            &dir.path().join("dst"),
            Vec::<String>::new(),
        )
        .unwrap();
        assert_eq!(
            plan.source_root(),
            dunce::canonicalize(dir.path().join("src")).unwrap()
        );
        assert_eq!(plan.links_to_create().len(), 1);
    }
}
