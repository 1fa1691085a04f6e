//! Docket: filesystem write coordination for shared document stores.
//!
//! This is the main entry point for the `docket` CLI. It parses arguments,
//! sets up logging, dispatches to the appropriate command handler, and maps
//! errors to exit codes.

mod cli;
mod commands;
mod logging;

use cli::{Cli, Command};
use docket::exit_codes;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    logging::init(cli.verbose, matches!(cli.command, Command::Daemon(_)));

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
