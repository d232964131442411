//! # gstx CLI entry point
//!
//! Parses command-line arguments, initializes tracing, and dispatches the
//! pipeline run. Exit code 0 covers success-like terminal statuses
//! (including `awaiting_approval` — the next step there is the approval
//! queue, not a retry).

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gstx_cli::{run_command, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!("gstx pipeline driver starting");

    match run_command(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
