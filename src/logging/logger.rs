//! Console and file logger with dry-run awareness.
use std::path::PathBuf;

use super::subscriber::{DRY_RUN_TARGET, HEADER_TARGET, STAGE_TARGET};
use super::types::{Log, RunHeader};
use super::utils::log_file_path;

/// Implement the methods of [`Log`] by delegating to inherent methods of the
/// same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Logger that emits [`tracing`] events for the installed subscriber.
///
/// Every event also lands in `<cache>/dotlink/<command>.log` at debug level
/// and above, whatever the console filter says.
#[derive(Debug)]
pub struct Logger {
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger for `command`.
    ///
    /// Only remembers where the log file lives; the file itself is created by
    /// [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_path(log_file_path(command))
    }

    pub(super) const fn with_path(log_file: Option<PathBuf>) -> Self {
        Self { log_file }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message.
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log an action a dry run would take.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Emit the run header as one structured event.
    pub fn header(&self, header: &RunHeader<'_>) {
        tracing::info!(
            target: HEADER_TARGET,
            source = %header.source.display(),
            destination = %header.destination.display(),
            mode = %header.mode
        );
    }

    /// Point the operator at the log file.
    pub fn print_log_location(&self) {
        if let Some(path) = &self.log_file {
            self.info(&format!("log: {}", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn header(&self, header: &RunHeader<'_>) {
        self.header(header);
    }
}
