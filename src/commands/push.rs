use anyhow::{bail, Result};
use clap::Args as ClapArgs;

use crate::commands::common::Services;
use crate::config::Config;
use crate::lifecycle::VcsStatus;

#[derive(ClapArgs)]
pub struct Args {
    /// Project whose folder should be committed and pushed
    pub project: String,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let services = Services::new(config);

    match services.lifecycle.push(&args.project).await? {
        VcsStatus::Pushed(outcome) => {
            let committed = if outcome.committed {
                "committed and pushed"
            } else {
                "nothing to commit, pushed"
            };
            let upstream = if outcome.upstream_set {
                " (upstream set)"
            } else {
                ""
            };
            println!("{}: {}{}", args.project, committed, upstream);
            Ok(())
        }
        VcsStatus::Skipped => {
            println!("{}: version control disabled", args.project);
            Ok(())
        }
        VcsStatus::Failed(reason) => bail!("Push of {} failed: {}", args.project, reason),
    }
}
