use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::commands::common::Services;
use crate::config::Config;

#[derive(ClapArgs)]
pub struct Args {
    /// Poll interval in milliseconds
    #[arg(long)]
    pub interval: Option<u64>,
}

/// Runs the reconciliation loop headless, logging every store event until
/// Ctrl-C.
pub async fn execute(args: Args, config: Config) -> Result<()> {
    let config = match args.interval {
        Some(ms) => config.with_poll_interval(ms),
        None => config,
    };

    let services = Services::new(config);
    let mut events = services.store.subscribe();
    let engine = services.restored_engine().await?;

    tracing::info!(
        "Watching windows every {:?}, projects under {:?}",
        services.config.poll_interval(),
        services.config.projects_path
    );

    let cancel = CancellationToken::new();
    let poller = tokio::spawn(engine.run(cancel.clone()));
    let resume = services.lifecycle.spawn_resume();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => tracing::info!("{}", event.describe()),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} store event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    cancel.cancel();
    poller.await.context("Reconciliation task failed")?;
    resume.await.context("Close resume task failed")?;
    Ok(())
}
