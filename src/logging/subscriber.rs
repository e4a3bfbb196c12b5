//! Tracing layers: colored console lines and the per-command log file.
use std::fmt::{self, Write as _};
use std::fs;
use std::io::{IsTerminal as _, Write as _};
use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use super::utils::log_file_path;

/// Target for stage headers.
pub(super) const STAGE_TARGET: &str = "dotlink::stage";
/// Target for actions that a dry run only reports.
pub(super) const DRY_RUN_TARGET: &str = "dotlink::dry_run";
/// Target for the run header carrying the roots and mode as fields.
pub(super) const HEADER_TARGET: &str = "dotlink::header";

/// Overrides the console filter, e.g. `DOTLINK_LOG=debug` or
/// `DOTLINK_LOG=dotlink::stage=info,warn`.
pub const FILTER_ENV: &str = "DOTLINK_LOG";

/// How an event is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Stage,
    DryRun,
    Header,
    Error,
    Warn,
    Info,
    Debug,
}

impl Kind {
    fn of(event: &Event<'_>) -> Self {
        let meta = event.metadata();
        let level = *meta.level();
        match meta.target() {
            STAGE_TARGET => Self::Stage,
            DRY_RUN_TARGET => Self::DryRun,
            HEADER_TARGET => Self::Header,
            _ if level == Level::ERROR => Self::Error,
            _ if level == Level::WARN => Self::Warn,
            _ if level == Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }

    /// Five-column tag used in the log file.
    const fn tag(self) -> &'static str {
        match self {
            Self::Stage => "STAGE",
            Self::DryRun => "PLAN ",
            Self::Header => "RUN  ",
            Self::Error => "ERROR",
            Self::Warn => "WARN ",
            Self::Info => "INFO ",
            Self::Debug => "DEBUG",
        }
    }
}

/// The message and named fields of one event.
#[derive(Debug, Default)]
struct Fields {
    message: String,
    named: Vec<(&'static str, String)>,
}

impl Fields {
    fn of(event: &Event<'_>) -> Self {
        let mut fields = Self::default();
        event.record(&mut fields);
        fields
    }

    fn put(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.named.push((field.name(), value));
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

/// Writes every event to `<cache>/dotlink/<command>.log`.
///
/// The file is truncated at startup and opens with a `#` banner naming the
/// version, command, and start time.  The run header adds `# source:`,
/// `# destination:` and `# mode:` lines once the roots are known; every other
/// event becomes one `HH:MM:SS.mmm TAG message` line.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Create (or truncate) `path` and write the banner.
    pub(super) fn create(path: &Path, command: &str) -> std::io::Result<Self> {
        let mut file = fs::File::create(path)?;
        writeln!(
            file,
            "# dotlink {} {command}",
            crate::commands::version::version()
        )?;
        writeln!(
            file,
            "# started {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn render(kind: Kind, fields: &Fields) -> String {
        let mut out = String::new();
        if kind == Kind::Header {
            for (name, value) in &fields.named {
                let _ = writeln!(out, "# {name}: {value}");
            }
        } else {
            let _ = writeln!(
                out,
                "{} {} {}",
                Utc::now().format("%H:%M:%S%.3f"),
                kind.tag(),
                fields.message
            );
        }
        out
    }
}

impl<S: Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let line = Self::render(Kind::of(event), &Fields::of(event));
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

/// Console lines: `==>` stages, indented progress, and `warning:` /
/// `error:` prefixes in the style of compiler diagnostics.
#[derive(Debug, Clone, Copy)]
struct ConsoleFormatter {
    color: bool,
}

impl ConsoleFormatter {
    fn paint(self, style: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{style}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let fields = Fields::of(event);
        let msg = fields.message.as_str();
        match Kind::of(event) {
            Kind::Stage => writeln!(writer, "{} {}", self.paint("1;34", "==>"), self.paint("1", msg)),
            Kind::DryRun => writeln!(writer, "  {}", self.paint("33", msg)),
            Kind::Header => {
                for (name, value) in &fields.named {
                    writeln!(writer, "  {name:<12} {value}")?;
                }
                Ok(())
            }
            Kind::Error => writeln!(writer, "{} {msg}", self.paint("1;31", "error:")),
            Kind::Warn => writeln!(writer, "{} {msg}", self.paint("1;33", "warning:")),
            Kind::Info => writeln!(writer, "  {msg}"),
            Kind::Debug => writeln!(writer, "  {}", self.paint("2", msg)),
        }
    }
}

/// Install the global subscriber: console plus log file.
///
/// The console shows `info` and above (`debug` with `verbose`) unless
/// [`FILTER_ENV`] holds a filter directive; warnings and errors go to stderr,
/// everything else to stdout.  Color is used only when stdout is a terminal
/// and `NO_COLOR` is unset.  The log file always receives `debug` and above.
/// Call once, before anything is logged.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _,
    };

    let console_filter = EnvFilter::try_from_env(FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let formatter = ConsoleFormatter {
        color: std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal(),
    };
    let console = tracing_subscriber::fmt::layer()
        .event_format(formatter)
        .with_writer(
            std::io::stderr
                .with_max_level(Level::WARN)
                .or_else(std::io::stdout),
        )
        .with_filter(console_filter);

    let file = log_file_path(command)
        .and_then(|path| FileLayer::create(&path, command).ok())
        .map(|layer| layer.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn paint_is_plain_without_color() {
        let plain = ConsoleFormatter { color: false };
        assert_eq!(plain.paint("1;31", "error:"), "error:");
        let colored = ConsoleFormatter { color: true };
        assert_eq!(colored.paint("1;31", "error:"), "\x1b[1;31merror:\x1b[0m");
    }

    #[test]
    fn header_fields_render_as_banner_lines() {
        let fields = Fields {
            message: String::new(),
            named: vec![("source", "/repo".to_string()), ("mode", "apply".to_string())],
        };
        assert_eq!(
            FileLayer::render(Kind::Header, &fields),
            "# source: /repo\n# mode: apply\n"
        );
    }

    #[test]
    fn event_lines_carry_time_and_tag() {
        let fields = Fields {
            message: "linked .bashrc".to_string(),
            named: Vec::new(),
        };
        let line = FileLayer::render(Kind::Info, &fields);
        // HH:MM:SS.mmm
        assert_eq!(line.find(' '), Some(12));
        assert!(line.ends_with(" INFO  linked .bashrc\n"));
    }
}
