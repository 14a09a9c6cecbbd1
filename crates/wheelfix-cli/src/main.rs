//! wheelfix CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wheelfix_cli::cmd;
use wheelfix_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries progress and the summary.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run { workers, max_total } => {
            cmd::run::run(config, workers, max_total, cli.quiet).await
        }
        Commands::Summary { json } => cmd::summary::summary(config, json),
        Commands::Failed => cmd::failed::failed(config),
    }
}
