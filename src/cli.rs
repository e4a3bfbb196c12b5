//! Command-line argument definitions.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::RootArgs;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "dotlink",
    about = "Mirror a dotfiles tree into a destination with symbolic links",
    version
)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (`DOTLINK_LOG` takes a full filter directive)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Short name of the subcommand, used for the log file name.
    #[must_use]
    pub const fn command_name(&self) -> &'static str {
        match self.command {
            Command::Deploy(_) => "deploy",
            Command::Status(_) => "status",
            Command::Version => "version",
            Command::LinkBatch(_) => "link-batch",
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Link every source file into the destination, resolving conflicts
    Deploy(DeployOpts),
    /// Show what deploy would do without changing anything
    Status(StatusOpts),
    /// Print version information
    Version,
    /// Create links listed in a batch file (used by the elevated re-invocation)
    #[command(hide = true)]
    LinkBatch(LinkBatchOpts),
}

/// Root and ignore options shared by `deploy` and `status`.
#[derive(Args, Debug, Clone, Default)]
pub struct RootOpts {
    /// Source tree to mirror (defaults to DOTLINK_SOURCE or the current directory)
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Destination root (defaults to DOTLINK_DEST, dotlink.toml, or the home directory)
    #[arg(short = 't', long)]
    pub dest: Option<PathBuf>,

    /// Extra ignore pattern (repeatable)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,
}

impl From<&RootOpts> for RootArgs {
    fn from(opts: &RootOpts) -> Self {
        Self {
            source: opts.source.clone(),
            dest: opts.dest.clone(),
            ignore: opts.ignore.clone(),
        }
    }
}

/// Options for the `deploy` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct DeployOpts {
    /// Roots and ignore patterns.
    #[command(flatten)]
    pub roots: RootOpts,

    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Accept every conflict and skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Options for the `status` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct StatusOpts {
    /// Roots and ignore patterns.
    #[command(flatten)]
    pub roots: RootOpts,
}

/// Options for the hidden `link-batch` subcommand.
#[derive(Args, Debug, Clone)]
pub struct LinkBatchOpts {
    /// Batch file written by the deploying process
    pub file: PathBuf,
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
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_deploy_defaults() {
        let cli = Cli::parse_from(["dotlink", "deploy"]);
        let Command::Deploy(opts) = cli.command else {
            panic!("expected deploy");
        };
        assert!(!opts.dry_run);
        assert!(!opts.yes);
        assert!(opts.roots.source.is_none());
    }

    #[test]
    fn parse_deploy_all_flags() {
        let cli = Cli::parse_from([
            "dotlink", "deploy", "--source", "/repo", "--dest", "/home/me", "-d", "-y", "-i",
            "*.swp", "--ignore", "secrets/",
        ]);
        let Command::Deploy(opts) = cli.command else {
            panic!("expected deploy");
        };
        assert_eq!(opts.roots.source, Some(PathBuf::from("/repo")));
        assert_eq!(opts.roots.dest, Some(PathBuf::from("/home/me")));
        assert!(opts.dry_run);
        assert!(opts.yes);
        assert_eq!(opts.roots.ignore, vec!["*.swp", "secrets/"]);
    }

    #[test]
    fn parse_status() {
        let cli = Cli::parse_from(["dotlink", "status", "-s", "/repo"]);
        assert!(matches!(cli.command, Command::Status(_)));
        assert_eq!(cli.command_name(), "status");
    }

    #[test]
    fn status_rejects_dry_run() {
        assert!(Cli::try_parse_from(["dotlink", "status", "--dry-run"]).is_err());
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["dotlink", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose_after_subcommand() {
        let cli = Cli::parse_from(["dotlink", "deploy", "-v"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_link_batch() {
        let cli = Cli::parse_from(["dotlink", "link-batch", "/tmp/pending-links.json"]);
        let Command::LinkBatch(opts) = cli.command else {
            panic!("expected link-batch");
        };
        assert_eq!(opts.file, PathBuf::from("/tmp/pending-links.json"));
    }

    #[test]
    fn link_batch_is_hidden() {
        let help = Cli::command().render_help().to_string();
        assert!(!help.contains("link-batch"));
        assert!(help.contains("deploy"));
    }

    #[test]
    fn root_opts_convert_to_root_args() {
        let opts = RootOpts {
            source: Some(PathBuf::from("/a")),
            dest: None,
            ignore: vec!["x".to_string()],
        };
        let args = RootArgs::from(&opts);
        assert_eq!(args.source, Some(PathBuf::from("/a")));
        assert_eq!(args.ignore, vec!["x"]);
    }
}
