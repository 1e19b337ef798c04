//! Contingent: exposure/outcome contingency tables from a federated task API.
//! Entry point for the `contingent` binary.

mod cli;
mod commands;
mod report;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::BuildArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("contingent=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "Contingent starting");

    match cli.command {
        Commands::Build {
            exposure_code,
            exposure_table,
            outcome_code,
            outcome_table,
            collection,
            wait_forever,
            json,
        } => {
            let args = BuildArgs {
                exposure_code,
                exposure_table,
                outcome_code,
                outcome_table,
                collection,
                wait_forever,
                json,
            };
            commands::build(cli.config.as_deref(), args).await
        }
        Commands::Analyze { a, b, c, d, alternative, yates, json } => {
            commands::analyze(cli.config.as_deref(), [a, b, c, d], alternative, yates, json)
        }
    }
}
