mod cli;
mod commands;
mod config;
mod model;
mod oracle;
mod pipeline;
mod store;
mod util;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

const DEFAULT_LOG_FILTER: &str = "versegloss=info,warn";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let command = cli.command.name();
    info!(command, version = env!("CARGO_PKG_VERSION"), "versegloss starting");

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(command, error = %err, "command failed");
            for cause in err.chain().skip(1) {
                error!(cause = %cause, "caused by");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate(args) => commands::generate::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

/// `RUST_LOG` wins; otherwise our own events at `info` and dependencies
/// only at `warn`.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
