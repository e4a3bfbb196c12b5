//! `dotlink` command-line entry point.
use clap::Parser;
use std::process::ExitCode;

use dotlink::cli::{self, Command};
use dotlink::commands;
use dotlink::engine::apply::CancelFlag;
use dotlink::error;
use dotlink::logging::{self, Logger};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    if matches!(args.command, Command::Version) {
        commands::version::run();
        return ExitCode::SUCCESS;
    }

    let command = args.command_name();
    logging::init_subscriber(args.verbose, command);
    let log = Logger::new(command);
    log.debug(&format!("dotlink {}", commands::version::version()));

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.cancel()) {
        log.warn(&format!("cannot install Ctrl-C handler: {e}"));
    }

    let result = match &args.command {
        Command::Deploy(opts) => commands::deploy::run(opts, &log, cancel),
        Command::Status(opts) => commands::status::run(opts, &log),
        Command::LinkBatch(opts) => commands::link_batch::run(&opts.file, &log),
        Command::Version => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log.error(&format!("{e:#}"));
            ExitCode::from(error::exit_code(&e))
        }
    }
}
