//! Console output and per-command log files.
//!
//! Code logs through the [`Log`] trait.  In the binary that is a [`Logger`]
//! emitting [`tracing`] events to the subscriber from [`init_subscriber`];
//! in tests it is usually a [`MemoryLog`].

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub use subscriber::{FILTER_ENV, init_subscriber};
pub use types::{Log, MemoryLog, RunHeader, RunMode};
pub use utils::cache_dir;

/// A [`Logger`] whose events reach a temporary log file through a
/// thread-local subscriber, for as long as the value lives.
#[cfg(test)]
pub(crate) struct CapturedLog {
    pub(crate) logger: Logger,
    pub(crate) path: std::path::PathBuf,
    _dir: tempfile::TempDir,
    _guard: tracing::dispatcher::DefaultGuard,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl CapturedLog {
    pub(crate) fn new() -> Self {
        use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("test.log");
        let layer = subscriber::FileLayer::create(&path, "test").expect("log file");
        let registry = tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG));
        let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(registry));
        Self {
            logger: Logger::with_path(Some(path.clone())),
            path,
            _dir: dir,
            _guard: guard,
        }
    }

    pub(crate) fn contents(&self) -> String {
        std::fs::read_to_string(&self.path).expect("read log file")
    }
}
