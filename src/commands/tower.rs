use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tokio_util::sync::CancellationToken;

use crate::commands::common::Services;
use crate::config::Config;
use crate::tower::TowerApp;

#[derive(ClapArgs)]
pub struct Args {
    /// Poll interval in milliseconds
    #[arg(long)]
    pub interval: Option<u64>,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let config = match args.interval {
        Some(ms) => config.with_poll_interval(ms),
        None => config,
    };

    let services = Services::new(config);
    let engine = services.restored_engine().await?;

    let cancel = CancellationToken::new();
    let poller = tokio::spawn(engine.run(cancel.clone()));
    let resume = services.lifecycle.spawn_resume();

    let mut app = TowerApp::new(services.handle(), services.lifecycle.clone());
    let result = app.run().await;

    cancel.cancel();
    poller.await.context("Reconciliation task failed")?;
    if !resume.is_finished() {
        tracing::info!("Waiting for interrupted closes to finish");
    }
    resume.await.context("Close resume task failed")?;

    result
}
