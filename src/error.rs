//! Domain-specific error types for the link reconciliation engine.
//!
//! Internal modules return typed errors (e.g., [`ValidationError`],
//! [`ApplyError`]) while command handlers at the CLI boundary convert them to
//! [`anyhow::Error`] via the standard `?` operator.  [`exit_code`] walks the
//! chain of an [`anyhow::Error`] to pick the process exit status.
//!
//! # Error hierarchy
//!
//! ```text
//! DotlinkError
//! ├── Validation(ValidationError): bad roots, bad ignore patterns (fatal, before scan)
//! ├── Traversal(TraversalError)  : unreadable subtree, link in source, case collision
//! ├── Apply(ApplyError)          : partial apply, cancellation, elevation failure
//! ├── Elevation(ElevationError)  : elevated batch could not run or failed
//! └── Declined                   : operator declined at confirmation
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::apply::Report;
use crate::engine::path::RelativePath;

/// Exit status for a successful run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status for any error without a more specific category.
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for bad paths or bad ignore patterns.
pub const EXIT_VALIDATION: u8 = 2;
/// Exit status when the operator declined the plan.
pub const EXIT_DECLINED: u8 = 3;
/// Exit status when one or more apply operations failed.
pub const EXIT_PARTIAL_APPLY: u8 = 4;
/// Exit status when the elevated link batch could not be run.
pub const EXIT_ELEVATION: u8 = 5;
/// Exit status when the run was interrupted with Ctrl-C.
pub const EXIT_CANCELLED: u8 = 130;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum DotlinkError {
    /// Input validation failed before any scan.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A subtree could not be traversed.
    #[error(transparent)]
    Traversal(#[from] TraversalError),

    /// Applying the plan failed partway.
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// The elevated link batch failed.
    #[error(transparent)]
    Elevation(#[from] ElevationError),

    /// The operator declined the plan at the confirmation prompt.
    #[error("declined by operator; no changes were made")]
    Declined,
}

/// Errors that abort a run before anything is scanned.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A root directory does not exist.
    #[error("{role} root does not exist: {}", path.display())]
    MissingRoot {
        /// Which root (`"source"` or `"destination"`).
        role: &'static str,
        /// The offending path.
        path: PathBuf,
    },

    /// A root path exists but is not a directory.
    #[error("{role} root is not a directory: {}", path.display())]
    NotADirectory {
        /// Which root (`"source"` or `"destination"`).
        role: &'static str,
        /// The offending path.
        path: PathBuf,
    },

    /// Source and destination resolve to the same directory.
    #[error("source and destination are the same directory: {}", path.display())]
    SameRoots {
        /// The shared path.
        path: PathBuf,
    },

    /// The destination root lies inside the source tree and would be scanned.
    #[error("destination {} is inside the source tree", path.display())]
    DestinationInsideSource {
        /// The destination root.
        path: PathBuf,
    },

    /// No source root was given and none could be detected.
    #[error("cannot determine source root. Use --source or set DOTLINK_SOURCE")]
    UndeterminedSource,

    /// No destination root was given and no home directory is known.
    #[error("cannot determine destination root. Use --dest or set DOTLINK_DEST")]
    UndeterminedDestination,

    /// An ignore pattern does not follow the pattern grammar.
    #[error("invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The settings file could not be parsed.
    #[error("invalid settings in {}: {message}", path.display())]
    Settings {
        /// Path to the settings file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A configuration file could not be read.
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised while walking the source tree or inspecting the destination.
///
/// These never abort a run: the affected entry or subtree is skipped and the
/// error is reported as a warning.
#[derive(Error, Debug)]
pub enum TraversalError {
    /// A directory could not be read; its subtree is skipped.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        /// Directory or entry that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The source tree contains a symbolic link, which is never followed.
    #[error("symbolic link inside source tree is not followed: {}", path.display())]
    LinkInSource {
        /// Path of the link inside the source tree.
        path: PathBuf,
    },

    /// Two source entries map onto the same destination slot.
    #[error("'{second}' collides with '{first}' on a case-insensitive destination")]
    Collision {
        /// The entry seen first (kept).
        first: RelativePath,
        /// The entry seen second (skipped).
        second: RelativePath,
    },

    /// A path is not valid UTF-8 or is not under the source root.
    #[error("cannot express {} relative to the source root", path.display())]
    NotRelative {
        /// The offending path.
        path: PathBuf,
    },

    /// The destination slot for an entry could not be inspected.
    #[error("cannot inspect {}: {reason}", path.display())]
    Inspect {
        /// Destination path.
        path: PathBuf,
        /// Why inspection failed.
        reason: String,
    },
}

/// The kind of filesystem operation an [`OperationFailure`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Creating a destination folder.
    CreateFolder,
    /// Moving a destination object into the source tree.
    Adopt,
    /// Removing a stale link before relinking.
    RemoveStaleLink,
    /// Creating a symbolic link.
    CreateLink,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateFolder => "create folder",
            Self::Adopt => "adopt",
            Self::RemoveStaleLink => "remove stale link",
            Self::CreateLink => "create link",
        };
        f.write_str(s)
    }
}

/// A single apply-time operation that was skipped after failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    /// What was being attempted.
    pub operation: Operation,
    /// The destination path the operation targeted.
    pub path: PathBuf,
    /// Human-readable failure reason.
    pub reason: String,
}

impl OperationFailure {
    /// Build a failure record from any displayable error.
    #[must_use]
    pub fn new(operation: Operation, path: PathBuf, reason: impl std::fmt::Display) -> Self {
        Self {
            operation,
            path,
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.path.display(), self.reason)
    }
}

/// Errors returned by [`Applier::apply`](crate::engine::apply::Applier::apply).
///
/// Every variant carries the partial [`Report`] of what was already done, so
/// the caller can show progress; re-running the engine resumes the rest.
#[derive(Error, Debug)]
pub enum ApplyError {
    /// One or more individual operations failed; the rest were applied.
    #[error("{} operation(s) failed", failures.len())]
    Partial {
        /// What was applied before and after the failures.
        report: Report,
        /// Each skipped operation.
        failures: Vec<OperationFailure>,
    },

    /// The run was interrupted; no further operations were issued.
    #[error("interrupted; stopped issuing operations")]
    Cancelled {
        /// What was applied before the interruption.
        report: Report,
    },

    /// Link creation required elevation and the elevated batch failed.
    #[error("elevated link creation failed")]
    Elevation {
        /// What was applied, including links verified after the batch.
        report: Report,
        /// Operations that failed before the batch, plus links still missing
        /// after it.
        failures: Vec<OperationFailure>,
        /// The elevation failure (carries the exact command).
        #[source]
        source: ElevationError,
    },
}

impl ApplyError {
    /// The partial report carried by every variant.
    #[must_use]
    pub const fn report(&self) -> &Report {
        match self {
            Self::Partial { report, .. }
            | Self::Cancelled { report }
            | Self::Elevation { report, .. } => report,
        }
    }
}

/// Errors from the elevated re-invocation that creates links in one batch.
#[derive(Error, Debug)]
pub enum ElevationError {
    /// No elevation mechanism is available on this system.
    #[error("cannot elevate ({reason}); run manually: {command}")]
    Unavailable {
        /// The command the operator should run.
        command: String,
        /// Why elevation is unavailable.
        reason: String,
    },

    /// The batch file could not be written.
    #[error("cannot write link batch {}: {source}; run manually: {command}", path.display())]
    Prepare {
        /// The command the operator should run once the file exists.
        command: String,
        /// Batch file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The elevated process could not be spawned.
    #[error("cannot spawn elevated process: {source}; run manually: {command}")]
    Spawn {
        /// The exact command that failed to start.
        command: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The elevated process ran but reported failure.
    #[error("elevated batch failed (exit {code}): {detail}; re-run manually: {command}")]
    BatchFailed {
        /// The exact command that was run.
        command: String,
        /// Exit code, `-1` when terminated by a signal.
        code: i32,
        /// Captured error output.
        detail: String,
    },
}

impl ElevationError {
    /// The exact batched command for manual re-execution.
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::Unavailable { command, .. }
            | Self::Prepare { command, .. }
            | Self::Spawn { command, .. }
            | Self::BatchFailed { command, .. } => command,
        }
    }
}

/// Map an error chain to a process exit status.
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<DotlinkError>() {
            return match e {
                DotlinkError::Validation(_) => EXIT_VALIDATION,
                DotlinkError::Declined => EXIT_DECLINED,
                DotlinkError::Apply(a) => apply_exit_code(a),
                DotlinkError::Elevation(_) => EXIT_ELEVATION,
                DotlinkError::Traversal(_) => EXIT_FAILURE,
            };
        }
        if cause.is::<ValidationError>() {
            return EXIT_VALIDATION;
        }
        if let Some(e) = cause.downcast_ref::<ApplyError>() {
            return apply_exit_code(e);
        }
        if cause.is::<ElevationError>() {
            return EXIT_ELEVATION;
        }
    }
    EXIT_FAILURE
}

const fn apply_exit_code(err: &ApplyError) -> u8 {
    match err {
        ApplyError::Partial { .. } => EXIT_PARTIAL_APPLY,
        ApplyError::Cancelled { .. } => EXIT_CANCELLED,
        ApplyError::Elevation { .. } => EXIT_ELEVATION,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    // -----------------------------------------------------------------------
    // ValidationError
    // -----------------------------------------------------------------------

    #[test]
    fn validation_missing_root_display() {
        let e = ValidationError::MissingRoot {
            role: "source",
            path: PathBuf::from("/nope"),
        };
        assert_eq!(e.to_string(), "source root does not exist: /nope");
    }

    #[test]
    fn validation_invalid_pattern_display() {
        let e = ValidationError::InvalidPattern {
            pattern: "C:/x".to_string(),
            reason: "pattern contains ':'",
        };
        assert_eq!(
            e.to_string(),
            "invalid ignore pattern 'C:/x': pattern contains ':'"
        );
    }

    #[test]
    fn validation_io_has_source() {
        use std::error::Error as StdError;
        let e = ValidationError::Io {
            path: PathBuf::from("/src/.dotlinkignore"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains(".dotlinkignore"));
    }

    // -----------------------------------------------------------------------
    // TraversalError
    // -----------------------------------------------------------------------

    #[test]
    fn traversal_collision_display() {
        let e = TraversalError::Collision {
            first: RelativePath::new("Foo"),
            second: RelativePath::new("foo"),
        };
        assert_eq!(
            e.to_string(),
            "'foo' collides with 'Foo' on a case-insensitive destination"
        );
    }

    // -----------------------------------------------------------------------
    // ApplyError / ElevationError
    // -----------------------------------------------------------------------

    #[test]
    fn apply_partial_counts_failures() {
        let e = ApplyError::Partial {
            report: Report::default(),
            failures: vec![
                OperationFailure::new(Operation::CreateLink, PathBuf::from("/d/a"), "denied"),
                OperationFailure::new(Operation::Adopt, PathBuf::from("/d/b"), "vanished"),
            ],
        };
        assert_eq!(e.to_string(), "2 operation(s) failed");
    }

    #[test]
    fn operation_failure_display() {
        let f = OperationFailure::new(
            Operation::RemoveStaleLink,
            PathBuf::from("/d/x"),
            "link changed since scan",
        );
        assert_eq!(
            f.to_string(),
            "remove stale link /d/x: link changed since scan"
        );
    }

    #[test]
    fn elevation_error_exposes_command() {
        let e = ElevationError::BatchFailed {
            command: "sudo dotlink link-batch /tmp/b.json".to_string(),
            code: 1,
            detail: "permission denied".to_string(),
        };
        assert_eq!(e.command(), "sudo dotlink link-batch /tmp/b.json");
        assert!(e.to_string().contains("re-run manually"));
    }

    // -----------------------------------------------------------------------
    // exit_code
    // -----------------------------------------------------------------------

    #[test]
    fn exit_code_for_validation() {
        let err: anyhow::Error = ValidationError::UndeterminedSource.into();
        assert_eq!(exit_code(&err), EXIT_VALIDATION);
    }

    #[test]
    fn exit_code_for_declined() {
        let err: anyhow::Error = DotlinkError::Declined.into();
        assert_eq!(exit_code(&err), EXIT_DECLINED);
    }

    #[test]
    fn exit_code_for_partial_apply_through_context() {
        let err = anyhow::Error::from(ApplyError::Partial {
            report: Report::default(),
            failures: Vec::new(),
        })
        .context("deploy");
        assert_eq!(exit_code(&err), EXIT_PARTIAL_APPLY);
    }

    #[test]
    fn exit_code_for_cancelled() {
        let err: anyhow::Error = ApplyError::Cancelled {
            report: Report::default(),
        }
        .into();
        assert_eq!(exit_code(&err), EXIT_CANCELLED);
    }

    #[test]
    fn exit_code_for_unknown_error() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code(&err), EXIT_FAILURE);
    }

    // -----------------------------------------------------------------------
    // Send + Sync bounds
    // -----------------------------------------------------------------------

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<DotlinkError>();
        assert_send_sync::<ValidationError>();
        assert_send_sync::<TraversalError>();
        assert_send_sync::<ApplyError>();
        assert_send_sync::<ElevationError>();
    }
}
