//! Hidden `link-batch` command, run under elevation by the deploying process.
use anyhow::{Result, bail};
use std::path::Path;

use crate::engine::privilege::{InProcessExecutor, LinkBatch, PrivilegedExecutor};
use crate::logging::Log;

/// Create every link listed in the batch file at `file`.
///
/// # Errors
///
/// Returns an error if the batch cannot be read or any link fails.
pub fn run(file: &Path, log: &dyn Log) -> Result<()> {
    let batch = LinkBatch::read(file)?;
    log.stage(&format!("Creating {} link(s)", batch.links.len()));
    let outcome = InProcessExecutor::default().create_links(&batch.links)?;
    for op in &outcome.created {
        log.info(&format!("linked {}", op.relative));
    }
    for failure in &outcome.failures {
        log.error(&failure.to_string());
    }
    if !outcome.failures.is_empty() {
        bail!("{} link(s) failed", outcome.failures.len());
    }
    Ok(())
}
