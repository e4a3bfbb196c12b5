//! The [`Log`] trait shared by the console logger and test sinks.
use std::fmt;
use std::path::Path;

/// What a command run may do to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Changes are applied.
    Apply,
    /// Changes are only reported.
    DryRun,
    /// Nothing is resolved or applied (`status`).
    ReadOnly,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Apply => "apply",
            Self::DryRun => "dry run",
            Self::ReadOnly => "read only",
        })
    }
}

/// The roots and mode of one run, logged once after configuration loads.
#[derive(Debug, Clone, Copy)]
pub struct RunHeader<'a> {
    /// Canonical source root.
    pub source: &'a Path,
    /// Canonical destination root.
    pub destination: &'a Path,
    /// What the run may change.
    pub mode: RunMode,
}

/// Abstraction over logging backends.
///
/// Engine and command code log through this trait so that tests can swap in
/// a recording sink without installing a global subscriber.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);

    /// Record which roots this run works on.
    fn header(&self, header: &RunHeader<'_>) {
        self.info(&format!("source: {}", header.source.display()));
        self.info(&format!("destination: {}", header.destination.display()));
        self.debug(&format!("mode: {}", header.mode));
    }
}

/// A [`Log`] that records every message in memory, tagged by level.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: std::sync::Mutex<Vec<String>>,
}

impl MemoryLog {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message logged so far, as `"<level>: <message>"`.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map_or_else(|_| Vec::new(), |guard| guard.clone())
    }

    /// Whether any message at `level` contains `needle`.
    #[must_use]
    pub fn contains(&self, level: &str, needle: &str) -> bool {
        let prefix = format!("{level}: ");
        self.lines()
            .iter()
            .any(|l| l.starts_with(&prefix) && l.contains(needle))
    }

    fn push(&self, level: &str, msg: &str) {
        if let Ok(mut guard) = self.lines.lock() {
            guard.push(format!("{level}: {msg}"));
        }
    }
}

impl Log for MemoryLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_records_in_order() {
        let log = MemoryLog::new();
        log.stage("Scanning");
        log.warn("careful");
        assert_eq!(log.lines(), vec!["stage: Scanning", "warn: careful"]);
    }

    #[test]
    fn default_header_logs_both_roots() {
        let log = MemoryLog::new();
        log.header(&RunHeader {
            source: Path::new("/repo"),
            destination: Path::new("/home/me"),
            mode: RunMode::DryRun,
        });
        assert!(log.contains("info", "source: /repo"));
        assert!(log.contains("info", "destination: /home/me"));
        assert!(log.contains("debug", "mode: dry run"));
    }

    #[test]
    fn memory_log_contains_matches_level() {
        let log = MemoryLog::new();
        log.dry_run("would create link a");
        assert!(log.contains("dry_run", "create link"));
        assert!(!log.contains("info", "create link"));
    }
}
