//! `subval` command line.

use std::process::ExitCode;

use clap::Parser;
use subval_server::logging::init_logging;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command};
use crate::commands::{run_file_types, run_serve, run_validate};
use crate::summary::print_report;

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.color.write_global();
    if let Err(error) = init_logging(&cli.log_config()) {
        eprintln!("error: failed to initialize logging: {error}");
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Command::Serve(args) => run_serve(args).map(|()| ExitCode::SUCCESS),
        Command::FileTypes => run_file_types().map(|()| ExitCode::SUCCESS),
        Command::Validate(args) => run_validate(args).map(|outcome| {
            let report = outcome.report();
            if args.json {
                match serde_json::to_string_pretty(report) {
                    Ok(json) => println!("{json}"),
                    Err(error) => eprintln!("error: {error}"),
                }
            } else {
                print_report(report);
            }
            if report.has_errors() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }),
    };
    result.unwrap_or_else(|error| {
        eprintln!("error: {error:#}");
        ExitCode::FAILURE
    })
}
