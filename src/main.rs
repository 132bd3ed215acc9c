use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod engine;
mod lifecycle;
mod models;
mod store;
mod tower;
mod utils;
mod windows;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(matches!(cli.command, Commands::Tower(_)))?;
    let config = cli.load_config()?;

    match cli.command {
        Commands::Tower(args) => commands::tower::execute(args, config).await,
        Commands::Watch(args) => commands::watch::execute(args, config).await,
        Commands::Close(args) => commands::close::execute(args, config).await,
        Commands::Resume => commands::resume::execute(config).await,
        Commands::Push(args) => commands::push::execute(args, config).await,
        Commands::Projects => commands::projects::execute(config).await,
        Commands::Snapshots(args) => commands::snapshots::execute(args, config).await,
    }
}

/// Logs to stderr, or to a daily file when the terminal belongs to the UI.
fn init_logging(to_file: bool) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wintrack=info"));

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    let log_dir = Config::log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "wintrack.log"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}
