//! Link creation with or without elevated privilege.
//!
//! Whether links can be created by this process is decided by creating a
//! scratch link in a temporary directory, never by OS version checks.  When
//! that fails, every pending link is written to a batch file and created by
//! one elevated re-invocation of this program.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::apply::CancelFlag;
use super::classify::LinkOp;
use crate::error::{ElevationError, Operation, OperationFailure};
use crate::exec;
use crate::logging::{Log, cache_dir};
use crate::platform::{Elevation, Platform};
use crate::resources::helpers::fs::create_symlink;
use crate::resources::symlink::SymlinkResource;
use crate::resources::{Applicable, Resource, ResourceChange, ResourceState};

/// File name of the pending batch inside the cache directory.
pub const BATCH_FILE_NAME: &str = "pending-links.json";

/// Subcommand the elevated process is invoked with.
pub const LINK_BATCH_COMMAND: &str = "link-batch";

/// What a batch of link creations achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkBatchOutcome {
    /// Links that did not exist before and now do.
    pub created: Vec<LinkOp>,
    /// Links that could not be created.
    pub failures: Vec<OperationFailure>,
}

/// Creates a batch of links.
#[cfg_attr(test, mockall::automock)]
pub trait PrivilegedExecutor {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Create every link in `links`.
    ///
    /// Individual failures are reported in the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError`] if the batch as a whole could not run.
    fn create_links(&self, links: &[LinkOp]) -> Result<LinkBatchOutcome, ElevationError>;
}

/// Whether this process can create symbolic links.
///
/// Any failure, including an unwritable temp directory, counts as "no".
#[must_use]
pub fn can_create_links() -> bool {
    scratch_link().is_ok()
}

fn scratch_link() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let target = dir.path().join("scratch-target");
    fs::write(&target, b"")?;
    create_symlink(&target, &dir.path().join("scratch-link"))?;
    Ok(())
}

/// Pick the executor for this process: in-process if a scratch link succeeds,
/// otherwise an elevated batch.
///
/// # Errors
///
/// Returns [`ElevationError::Unavailable`] if elevation is needed but the
/// batch cannot be prepared (e.g., the program path is unknown).
pub fn select_executor(
    cancel: &CancelFlag,
    log: &dyn Log,
) -> Result<Box<dyn PrivilegedExecutor>, ElevationError> {
    if can_create_links() {
        log.debug("scratch link succeeded; creating links in-process");
        return Ok(Box::new(InProcessExecutor::new(cancel.clone())));
    }
    log.warn("cannot create symbolic links here; requesting elevation for the link batch");
    Ok(Box::new(ElevatedBatchExecutor::for_current_process()?))
}

/// The links whose slot does not already hold the expected link.
#[must_use]
pub fn missing_links(links: &[LinkOp]) -> Vec<LinkOp> {
    links
        .iter()
        .filter(|op| {
            !matches!(
                SymlinkResource::new(op.target_path.clone(), op.link_path.clone())
                    .current_state(),
                Ok(ResourceState::Correct)
            )
        })
        .cloned()
        .collect()
}

/// Re-inspect every link and split them into present and missing.
#[must_use]
pub fn verify_links(links: &[LinkOp]) -> LinkBatchOutcome {
    let mut outcome = LinkBatchOutcome::default();
    for op in links {
        let state = SymlinkResource::new(op.target_path.clone(), op.link_path.clone())
            .current_state();
        match state {
            Ok(ResourceState::Correct) => outcome.created.push(op.clone()),
            Ok(other) => outcome.failures.push(OperationFailure::new(
                Operation::CreateLink,
                op.link_path.clone(),
                format!("not created by elevated batch ({other:?})"),
            )),
            Err(e) => outcome.failures.push(OperationFailure::new(
                Operation::CreateLink,
                op.link_path.clone(),
                format!("{e:#}"),
            )),
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// In-process
// ---------------------------------------------------------------------------

/// Creates links directly, re-checking each slot first.
#[derive(Debug, Clone, Default)]
pub struct InProcessExecutor {
    cancel: CancelFlag,
}

impl InProcessExecutor {
    /// Stop creating links once `cancel` is set.
    #[must_use]
    pub const fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

impl PrivilegedExecutor for InProcessExecutor {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn create_links(&self, links: &[LinkOp]) -> Result<LinkBatchOutcome, ElevationError> {
        let mut outcome = LinkBatchOutcome::default();
        for op in links {
            if self.cancel.is_cancelled() {
                break;
            }
            let resource = SymlinkResource::new(op.target_path.clone(), op.link_path.clone());
            match resource.apply() {
                Ok(ResourceChange::Applied) => outcome.created.push(op.clone()),
                Ok(ResourceChange::AlreadyCorrect) => {}
                Err(e) => outcome.failures.push(OperationFailure::new(
                    Operation::CreateLink,
                    op.link_path.clone(),
                    format!("{e:#}"),
                )),
            }
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Elevated batch
// ---------------------------------------------------------------------------

/// On-disk form of a pending link batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkBatch {
    /// Format version.
    pub version: u32,
    /// Links to create, in order.
    pub links: Vec<LinkOp>,
}

impl LinkBatch {
    const VERSION: u32 = 1;

    /// Wrap `links` in a batch.
    #[must_use]
    pub fn new(links: Vec<LinkOp>) -> Self {
        Self {
            version: Self::VERSION,
            links,
        }
    }

    /// Write the batch as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }

    /// Read a batch written by [`write`](Self::write).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or has
    /// an unknown format version.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context as _;
        let bytes =
            fs::read(path).with_context(|| format!("reading link batch {}", path.display()))?;
        let batch: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing link batch {}", path.display()))?;
        anyhow::ensure!(
            batch.version == Self::VERSION,
            "unsupported link batch version {}",
            batch.version
        );
        Ok(batch)
    }
}

/// Serializes pending links to a file and creates them in one elevated
/// invocation of `<program> link-batch <file>`.
///
/// The batch is not atomic: a failure partway leaves some links created.
/// Afterwards each link is re-verified in-process to learn which ones exist.
#[derive(Debug, Clone)]
pub struct ElevatedBatchExecutor {
    program: PathBuf,
    batch_path: PathBuf,
    elevation: Elevation,
    launcher: Option<PathBuf>,
}

impl ElevatedBatchExecutor {
    /// Build an executor for an explicit program and batch file.
    #[must_use]
    pub const fn new(program: PathBuf, batch_path: PathBuf, elevation: Elevation) -> Self {
        Self {
            program,
            batch_path,
            elevation,
            launcher: None,
        }
    }

    /// Build an executor that re-invokes the running program, with the batch
    /// file in the cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Unavailable`] if the running program or the
    /// cache directory cannot be located.
    pub fn for_current_process() -> Result<Self, ElevationError> {
        let unavailable = |reason: String| ElevationError::Unavailable {
            command: format!("dotlink {LINK_BATCH_COMMAND} <batch-file>"),
            reason,
        };
        let program = std::env::current_exe()
            .map_err(|e| unavailable(format!("cannot locate running program: {e}")))?;
        let batch_path = cache_dir()
            .ok_or_else(|| unavailable("cannot create cache directory".to_string()))?
            .join(BATCH_FILE_NAME);
        Ok(Self::new(
            program,
            batch_path,
            Platform::detect().elevation(),
        ))
    }

    /// Use `launcher` instead of looking up `sudo` / `powershell`.
    #[must_use]
    pub fn with_launcher(mut self, launcher: PathBuf) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Where the batch file is written.
    #[must_use]
    pub fn batch_path(&self) -> &Path {
        &self.batch_path
    }

    /// The launcher program and its arguments.
    #[must_use]
    pub fn invocation(&self) -> (String, Vec<String>) {
        let program = self.program.to_string_lossy().into_owned();
        let batch = self.batch_path.to_string_lossy().into_owned();
        match self.elevation {
            Elevation::Sudo => (
                self.launcher_name("sudo"),
                vec![program, LINK_BATCH_COMMAND.to_string(), batch],
            ),
            Elevation::RunAs => {
                let script = format!(
                    "$p = Start-Process -FilePath '{}' -ArgumentList '{LINK_BATCH_COMMAND}','\"{}\"' \
                     -Verb RunAs -Wait -PassThru; exit $p.ExitCode",
                    ps_quote(&program),
                    ps_quote(&batch),
                );
                (
                    self.launcher_name("powershell"),
                    vec![
                        "-NoProfile".to_string(),
                        "-NonInteractive".to_string(),
                        "-Command".to_string(),
                        script,
                    ],
                )
            }
        }
    }

    /// The exact command line, for the operator to run by hand.
    #[must_use]
    pub fn command_line(&self) -> String {
        let (program, args) = self.invocation();
        exec::command_line(&program, &args)
    }

    fn launcher_name(&self, default: &str) -> String {
        self.launcher.as_ref().map_or_else(
            || default.to_string(),
            |p| p.to_string_lossy().into_owned(),
        )
    }
}

/// Escape a string for a single-quoted PowerShell literal.
fn ps_quote(s: &str) -> String {
    s.replace('\'', "''")
}

impl PrivilegedExecutor for ElevatedBatchExecutor {
    fn name(&self) -> &'static str {
        "elevated batch"
    }

    fn create_links(&self, links: &[LinkOp]) -> Result<LinkBatchOutcome, ElevationError> {
        let command = self.command_line();
        let (program, args) = self.invocation();

        let resolved = if self.launcher.is_some() {
            Some(PathBuf::from(&program))
        } else {
            exec::find_program(&program)
        };
        let Some(resolved) = resolved else {
            return Err(ElevationError::Unavailable {
                command,
                reason: format!("'{program}' not found on PATH"),
            });
        };

        LinkBatch::new(links.to_vec())
            .write(&self.batch_path)
            .map_err(|source| ElevationError::Prepare {
                command: command.clone(),
                path: self.batch_path.clone(),
                source,
            })?;

        let code = exec::run_attached(&resolved.to_string_lossy(), &args).map_err(|source| {
            ElevationError::Spawn {
                command: command.clone(),
                source,
            }
        })?;

        let outcome = verify_links(links);
        if code != 0 {
            return Err(ElevationError::BatchFailed {
                command,
                code,
                detail: format!(
                    "{} of {} link(s) missing afterwards",
                    outcome.failures.len(),
                    links.len()
                ),
            });
        }
        // The batch is kept on failure so the printed command still works.
        let _ = fs::remove_file(&self.batch_path);
        Ok(outcome)
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
    use crate::engine::path::RelativePath;

    fn link_op(dir: &Path, name: &str) -> LinkOp {
        let target = dir.join("src").join(name);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, name).unwrap();
        LinkOp {
            relative: RelativePath::new(name),
            link_path: dir.join("dst").join(name),
            target_path: target,
        }
    }

    // -----------------------------------------------------------------------
    // capability
    // -----------------------------------------------------------------------

    #[cfg(unix)]
    #[test]
    fn scratch_link_succeeds_on_unix_temp_dir() {
        assert!(can_create_links());
    }

    // -----------------------------------------------------------------------
    // in-process
    // -----------------------------------------------------------------------

    #[cfg(unix)]
    #[test]
    fn in_process_creates_links() {
        let dir = tempfile::tempdir().unwrap();
        let ops = vec![link_op(dir.path(), "a"), link_op(dir.path(), "b")];
        let outcome = InProcessExecutor::default().create_links(&ops).unwrap();
        assert_eq!(outcome.created, ops);
        assert!(outcome.failures.is_empty());
        assert_eq!(fs::read_link(&ops[0].link_path).unwrap(), ops[0].target_path);
    }

    #[cfg(unix)]
    #[test]
    fn missing_links_skips_slots_already_linked() {
        let dir = tempfile::tempdir().unwrap();
        let ops = vec![link_op(dir.path(), "a"), link_op(dir.path(), "b")];
        fs::create_dir_all(ops[0].link_path.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&ops[0].target_path, &ops[0].link_path).unwrap();

        assert_eq!(missing_links(&ops), vec![ops[1].clone()]);
    }

    #[test]
    fn in_process_records_occupied_slot() {
        let dir = tempfile::tempdir().unwrap();
        let op = link_op(dir.path(), "taken");
        fs::create_dir_all(op.link_path.parent().unwrap()).unwrap();
        fs::write(&op.link_path, "someone else").unwrap();

        let outcome = InProcessExecutor::default()
            .create_links(std::slice::from_ref(&op))
            .unwrap();
        assert!(outcome.created.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].operation, Operation::CreateLink);
        assert_eq!(
            fs::read_to_string(&op.link_path).unwrap(),
            "someone else"
        );
    }

    #[test]
    fn in_process_stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let ops = vec![link_op(dir.path(), "a")];
        let cancel = CancelFlag::new();
        cancel.cancel();
        let outcome = InProcessExecutor::new(cancel).create_links(&ops).unwrap();
        assert_eq!(outcome, LinkBatchOutcome::default());
        assert!(ops[0].link_path.symlink_metadata().is_err());
    }

    // -----------------------------------------------------------------------
    // batch file
    // -----------------------------------------------------------------------

    #[test]
    fn batch_file_is_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BATCH_FILE_NAME);
        let batch = LinkBatch::new(vec![link_op(dir.path(), "x")]);
        batch.write(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"link_path\""));
        assert_eq!(LinkBatch::read(&path).unwrap(), batch);
    }

    #[test]
    fn batch_with_unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(BATCH_FILE_NAME);
        fs::write(&path, r#"{"version": 99, "links": []}"#).unwrap();
        let err = LinkBatch::read(&path).unwrap_err();
        assert!(err.to_string().contains("version 99"));
    }

    // -----------------------------------------------------------------------
    // elevated invocation
    // -----------------------------------------------------------------------

    #[test]
    fn sudo_invocation_reinvokes_program() {
        let executor = ElevatedBatchExecutor::new(
            PathBuf::from("/usr/bin/dotlink"),
            PathBuf::from("/tmp/pending-links.json"),
            Elevation::Sudo,
        );
        assert_eq!(
            executor.command_line(),
            "sudo /usr/bin/dotlink link-batch /tmp/pending-links.json"
        );
    }

    #[test]
    fn runas_invocation_waits_and_forwards_exit_code() {
        let executor = ElevatedBatchExecutor::new(
            PathBuf::from(r"C:\Tools\dotlink.exe"),
            PathBuf::from(r"C:\Users\me\.cache\dotlink\pending-links.json"),
            Elevation::RunAs,
        );
        let (program, args) = executor.invocation();
        assert_eq!(program, "powershell");
        let script = args.last().unwrap();
        assert!(script.contains("-Verb RunAs -Wait -PassThru"));
        assert!(script.contains("exit $p.ExitCode"));
        assert!(script.contains(r"'C:\Tools\dotlink.exe'"));
    }

    #[test]
    fn missing_launcher_is_unavailable_with_command() {
        let dir = tempfile::tempdir().unwrap();
        let executor = ElevatedBatchExecutor::new(
            PathBuf::from("/usr/bin/dotlink"),
            dir.path().join(BATCH_FILE_NAME),
            Elevation::Sudo,
        )
        .with_launcher(PathBuf::from("/nonexistent/launcher-12345"));
        let err = executor.create_links(&[]).unwrap_err();
        assert!(matches!(err, ElevationError::Spawn { .. }));
        assert!(err.command().contains("link-batch"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_batch_reports_exit_code_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let ops = vec![link_op(dir.path(), "a")];
        let executor = ElevatedBatchExecutor::new(
            PathBuf::from("/usr/bin/dotlink"),
            dir.path().join(BATCH_FILE_NAME),
            Elevation::Sudo,
        )
        .with_launcher(exec::find_program("false").unwrap());

        let err = executor.create_links(&ops).unwrap_err();
        let ElevationError::BatchFailed { code, detail, .. } = &err else {
            panic!("expected BatchFailed, got {err:?}");
        };
        assert_eq!(*code, 1);
        assert!(detail.contains("1 of 1"));
        assert!(executor.batch_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn successful_batch_is_verified_link_by_link() {
        let dir = tempfile::tempdir().unwrap();
        let ops = vec![link_op(dir.path(), "a")];
        let executor = ElevatedBatchExecutor::new(
            PathBuf::from("/usr/bin/dotlink"),
            dir.path().join(BATCH_FILE_NAME),
            Elevation::Sudo,
        )
        .with_launcher(exec::find_program("true").unwrap());

        // `true` exits 0 without creating anything.
        let outcome = executor.create_links(&ops).unwrap();
        assert!(outcome.created.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert!(!executor.batch_path().exists());
    }
}
