// medallion/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug medallion run ... pour voir les détails
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { project_dir } => commands::run::execute(project_dir).await,
        Commands::Ingest { project_dir } => commands::ingest::execute(project_dir).await,
        Commands::Quality { project_dir } => commands::quality::execute(project_dir),
        Commands::Transform { project_dir } => commands::transform::execute(project_dir),
        Commands::Assemble { project_dir } => commands::assemble::execute(project_dir),
        Commands::Clean { project_dir, layer } => commands::clean::execute(project_dir, layer),
        Commands::Query { query, project_dir } => commands::query::execute(project_dir, query).await,
    }
}
