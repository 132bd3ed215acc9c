use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::store::assignment::CycleReport;
use crate::store::{AssignmentStore, ProjectFiles};
use crate::windows::{EnrichmentPipeline, IdentityTable, WindowSource};

/// Polls the window source and folds each live set into the store.
pub struct ReconciliationEngine {
    source: Arc<dyn WindowSource>,
    identities: IdentityTable,
    pipeline: EnrichmentPipeline,
    store: AssignmentStore,
    files: Arc<ProjectFiles>,
    interval: Duration,
    enumerate_timeout: Duration,
}

impl ReconciliationEngine {
    pub fn new(
        source: Arc<dyn WindowSource>,
        store: AssignmentStore,
        files: Arc<ProjectFiles>,
        config: &Config,
    ) -> Self {
        let pipeline = EnrichmentPipeline::from_config(&config.enrichment, config.timeouts.enrich());
        if pipeline.is_empty() {
            tracing::debug!("Window enrichment disabled");
        }
        Self {
            source,
            identities: IdentityTable::new(),
            pipeline,
            store,
            files,
            interval: config.poll_interval(),
            enumerate_timeout: config.timeouts.enumerate(),
        }
    }

    pub fn store(&self) -> &AssignmentStore {
        &self.store
    }

    /// Loads the assignment file and the known project folders.
    pub async fn restore(&self) -> Result<()> {
        let assignments = self
            .files
            .load_assignments()
            .await
            .context("Failed to load saved assignments")?;
        let projects = self
            .files
            .list_projects()
            .await
            .context("Failed to list project folders")?;

        tracing::info!(
            "Restored {} assignment(s) across {} project folder(s)",
            assignments.len(),
            projects.len()
        );
        self.store.restore(assignments, projects).await;
        Ok(())
    }

    /// Runs one enumerate-enrich-reconcile-persist pass.
    ///
    /// Returns None when enumeration failed; nothing is treated as closed in
    /// that case.
    pub async fn run_cycle(&mut self) -> Option<CycleReport> {
        let mut windows =
            match tokio::time::timeout(self.enumerate_timeout, self.source.enumerate()).await {
                Ok(Ok(windows)) => windows,
                Ok(Err(e)) => {
                    tracing::warn!("Window enumeration failed, skipping cycle: {:#}", e);
                    return None;
                }
                Err(_) => {
                    tracing::warn!(
                        "Window enumeration timed out after {:?}, skipping cycle",
                        self.enumerate_timeout
                    );
                    return None;
                }
            };

        self.pipeline.enrich(&mut windows).await;
        let records = self.identities.resolve(windows);
        let (report, snapshot) = self.store.reconcile(records).await;

        if !report.is_quiet() {
            tracing::debug!(
                "Cycle: {} live, {} new, {} closed",
                report.live,
                report.new_pending.len(),
                report.removed.len()
            );
        }

        if let Err(e) = self.files.persist(&snapshot).await {
            tracing::warn!("Failed to persist cycle state: {:#}", e);
        }

        Some(report)
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Reconciliation loop started ({:?} interval)", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Reconciliation loop shutting down");
                    break;
                }
            }
        }
    }
}
