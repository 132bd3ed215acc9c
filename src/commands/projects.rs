use anyhow::Result;

use crate::commands::common::Services;
use crate::config::Config;
use crate::utils::{fit_width, truncate_str};

const NAME_WIDTH: usize = 24;

/// Lists active projects with live and recorded window counts.
pub async fn execute(config: Config) -> Result<()> {
    let services = Services::new(config);
    let mut engine = services.restored_engine().await?;
    if engine.run_cycle().await.is_none() {
        println!("(window enumeration failed; live counts unavailable)");
    }

    let snapshot = services.store.get().await;
    println!(
        "{} {:>5} {:>9} {:>10}",
        fit_width("PROJECT", NAME_WIDTH),
        "LIVE",
        "RECORDED",
        "SNAPSHOTS"
    );

    for project in &snapshot.projects {
        let live = snapshot.windows_of(project).len();
        let recorded = services
            .files
            .read_project_record(project)
            .await?
            .map(|record| record.len())
            .unwrap_or(0);
        let snapshots = services.files.list_snapshot_ids(project).await?.len();
        let mut line = format!(
            "{} {:>5} {:>9} {:>10}",
            fit_width(project.as_str(), NAME_WIDTH),
            live,
            recorded,
            snapshots
        );
        if snapshot.closing.contains(project) {
            line.push_str("  (closing)");
        }
        println!("{}", line);
    }

    if !snapshot.pending.is_empty() {
        println!("\nPending ({}):", snapshot.pending.len());
        for key in &snapshot.pending {
            if let Some(record) = snapshot.windows.get(key) {
                println!("  {}", truncate_str(record.title(), 70));
            }
        }
    }

    Ok(())
}
