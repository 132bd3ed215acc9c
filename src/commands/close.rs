use anyhow::Result;
use clap::Args as ClapArgs;

use crate::commands::common::Services;
use crate::config::Config;
use crate::lifecycle::VcsStatus;

#[derive(ClapArgs)]
pub struct Args {
    /// Project to close
    pub project: String,

    /// Closing notes saved next to the snapshot
    #[arg(short, long)]
    pub notes: Option<String>,

    /// Skip the commit and push of the project folder
    #[arg(long)]
    pub no_push: bool,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let services = Services::new(config);
    let mut engine = services.restored_engine().await?;

    // One pass so the live window set and metadata are current.
    if engine.run_cycle().await.is_none() {
        tracing::warn!("Window enumeration failed; closing from recorded state");
    }

    let report = services
        .lifecycle
        .close_project(Some(&args.project), args.notes, !args.no_push)
        .await?;

    println!("{}", report.summary());
    for failure in &report.close_failures {
        println!("  not closed: {} ({})", failure.title, failure.reason);
    }
    if let VcsStatus::Failed(_) = report.vcs {
        println!("Retry the upload with: wintrack push {}", report.project);
    }

    Ok(())
}
