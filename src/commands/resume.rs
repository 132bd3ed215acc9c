use anyhow::Result;

use crate::commands::common::Services;
use crate::config::Config;

pub async fn execute(config: Config) -> Result<()> {
    let services = Services::new(config);
    services.restored_engine().await?;

    let reports = services.lifecycle.resume_pending().await?;
    if reports.is_empty() {
        println!("No interrupted closes");
        return Ok(());
    }

    for report in reports {
        let from = report
            .resumed_from
            .map(|stage| stage.label())
            .unwrap_or("start");
        println!("{} (resumed after {})", report.summary(), from);
    }
    Ok(())
}
