use anyhow::Result;
use clap::Args as ClapArgs;

use crate::commands::common::Services;
use crate::config::Config;
use crate::models::ProjectName;

#[derive(ClapArgs)]
pub struct Args {
    /// Project whose snapshot history should be listed
    pub project: String,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let services = Services::new(config);
    let files = &services.files;
    let project = ProjectName::parse(&args.project)?;

    if !files.project_dir(&project).exists() {
        anyhow::bail!("No project folder for {}", project);
    }

    println!("Project: {}", project);
    println!(
        "  current state: {}",
        present(files.current_path(&project).exists())
    );
    println!(
        "  LastState:     {}",
        present(files.last_state_path(&project).exists())
    );
    println!(
        "  closing notes: {}",
        present(files.notes_path(&project).exists())
    );

    if let Some(marker) = files.read_marker(&project).await? {
        println!(
            "  interrupted close: after {} (started {})",
            marker.stage.label(),
            marker.started_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let ids = files.list_snapshot_ids(&project).await?;
    if ids.is_empty() {
        println!("  no archived snapshots");
    } else {
        println!("  archived snapshots ({}):", ids.len());
        for id in ids {
            println!("    {}", files.snapshot_path(&project, id).display());
        }
    }

    Ok(())
}

fn present(exists: bool) -> &'static str {
    if exists {
        "yes"
    } else {
        "no"
    }
}
