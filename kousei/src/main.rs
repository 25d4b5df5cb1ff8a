// kousei/src/main.rs
//! Kousei entry point.
//!
//! Parses the command line, sets up logging and dispatches to the subcommand.
//! Exit codes: 0 on success, 1 when `check --fail-on` trips or on any error, 2 when the
//! guards refuse the input.

use anyhow::Result;
use clap::Parser;
use log::debug;
use std::process::ExitCode;

use kousei::cli::{Cli, Commands};
use kousei::commands::{check, fix, guard, rules};
use kousei::logger;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logger::init_logger(logger::level_from_flags(cli.quiet, cli.debug));
    debug!("Parsed arguments: {:?}", cli);

    match &cli.command {
        Commands::Check(cmd) => check::run_check(cmd).await,
        Commands::Fix(cmd) => fix::run_fix(cmd),
        Commands::Guard(cmd) => guard::run_guard(cmd),
        Commands::Rules(cmd) => rules::run_rules(cmd),
    }
}
