//! repsync CLI - drive and inspect RepLog's offline sync engine
//!
//! Enqueue mutations, run sync passes, and resolve conflicts from the
//! terminal, against the same local database the apps use.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let db_path = commands::common::resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Enqueue { kind, entity, data } => {
            commands::enqueue::run_enqueue(kind.into(), entity.into(), &data, &db_path).await
        }
        Commands::Pending { json } => commands::queue::run_pending(json, &db_path).await,
        Commands::Sync => commands::sync::run_sync(&db_path).await,
        Commands::Conflicts { json } => commands::conflicts::run_conflicts(json, &db_path).await,
        Commands::Resolve { id, strategy } => {
            commands::conflicts::run_resolve(&id, strategy, &db_path).await
        }
        Commands::Retry { id } => commands::queue::run_retry(&id, &db_path).await,
        Commands::Prune => commands::queue::run_prune(&db_path).await,
        Commands::Metrics { json } => commands::metrics::run_metrics(json, &db_path).await,
        Commands::Completions { shell } => {
            commands::completions::run_completions(shell);
            Ok(())
        }
    }
}
