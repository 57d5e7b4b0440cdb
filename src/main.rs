//! healthscan - code health reports and CI gates

use clap::error::ErrorKind;
use clap::Parser;
use healthscan::cli;
use healthscan::gate::{EXIT_ERROR, EXIT_PASS};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    // Usage errors exit 1, never 2, which is reserved for gate violations
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::from(EXIT_PASS),
                _ => ExitCode::from(EXIT_ERROR),
            };
        }
    };

    // Logs go to stderr so JSON on stdout stays parseable
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli::run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
