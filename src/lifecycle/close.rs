use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::vcs::{VcsClient, VcsOutcome};
use crate::config::Config;
use crate::models::{
    CloseMarker, CloseStage, CloseTarget, ProjectName, ProjectNameError, WindowRecord,
};
use crate::store::persistence::RotationOutcome;
use crate::store::{AssignmentStore, ProjectFiles, StoreError};
use crate::windows::WindowSource;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("No project selected")]
    NoProjectNamed,

    #[error(transparent)]
    InvalidProject(#[from] ProjectNameError),

    #[error("Unknown project: {0}")]
    UnknownProject(ProjectName),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Close of {project} stopped during {stage}: {source:#}")]
    Stage {
        project: ProjectName,
        stage: &'static str,
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsStatus {
    Skipped,
    Pushed(VcsOutcome),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    pub title: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReport {
    pub project: ProjectName,
    pub rotation: Option<RotationOutcome>,
    pub closed: Vec<String>,
    pub close_failures: Vec<CloseFailure>,
    pub notes_saved: bool,
    pub vcs: VcsStatus,
    pub resumed_from: Option<CloseStage>,
}

impl CloseReport {
    fn new(project: ProjectName) -> Self {
        Self {
            project,
            rotation: None,
            closed: Vec::new(),
            close_failures: Vec::new(),
            notes_saved: false,
            vcs: VcsStatus::Skipped,
            resumed_from: None,
        }
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("Closed {}", self.project)];
        if let Some(id) = self.rotation.as_ref().and_then(|r| r.archived) {
            parts.push(format!("saved state{}", id));
        }
        parts.push(format!("{} window(s) closed", self.closed.len()));
        if !self.close_failures.is_empty() {
            parts.push(format!("{} failed to close", self.close_failures.len()));
        }
        match &self.vcs {
            VcsStatus::Skipped => {}
            VcsStatus::Pushed(_) => parts.push("pushed".to_string()),
            VcsStatus::Failed(reason) => parts.push(format!("push failed: {}", reason)),
        }
        parts.join(", ")
    }
}

/// Drives the close state machine for a project.
///
/// Each completed stage is recorded in the project's close marker so an
/// interrupted close picks up at the next stage.
#[derive(Clone)]
pub struct ProjectLifecycleManager {
    store: AssignmentStore,
    files: Arc<ProjectFiles>,
    source: Arc<dyn WindowSource>,
    vcs: Arc<dyn VcsClient>,
    window_close_timeout: Duration,
    vcs_timeout: Duration,
    vcs_enabled: bool,
}

impl ProjectLifecycleManager {
    pub fn new(
        store: AssignmentStore,
        files: Arc<ProjectFiles>,
        source: Arc<dyn WindowSource>,
        vcs: Arc<dyn VcsClient>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            files,
            source,
            vcs,
            window_close_timeout: config.timeouts.window_close(),
            vcs_timeout: config.timeouts.vcs(),
            vcs_enabled: config.vcs.enabled,
        }
    }

    pub async fn close_project(
        &self,
        project: Option<&str>,
        notes: Option<String>,
        push: bool,
    ) -> Result<CloseReport, LifecycleError> {
        let raw = project
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(LifecycleError::NoProjectNamed)?;
        let project = ProjectName::parse(raw)?;

        let snapshot = self.store.get().await;
        if !project.is_unassigned() && !snapshot.is_known_project(&project) {
            return Err(LifecycleError::UnknownProject(project));
        }

        let windows = self.store.begin_close(&project).await?;
        let targets: Vec<CloseTarget> = windows.iter().map(WindowRecord::close_target).collect();
        tracing::info!("Closing {} ({} window(s))", project, targets.len());

        let marker = CloseMarker::new(project.clone(), targets, notes, push && self.vcs_enabled);
        if let Err(e) = self.files.write_marker(&marker).await {
            self.store.abort_close(&project).await;
            return Err(LifecycleError::Stage {
                project,
                stage: CloseStage::Active.label(),
                source: e,
            });
        }

        self.drive(marker, CloseReport::new(project)).await
    }

    /// Continues every close interrupted before it reached Removed.
    pub async fn resume_pending(&self) -> anyhow::Result<Vec<CloseReport>> {
        let markers = self.files.list_markers().await?;
        let mut reports = Vec::new();

        for marker in markers {
            let project = marker.project.clone();
            if let Err(e) = self.store.begin_close(&project).await {
                tracing::warn!("Cannot resume close of {}: {}", project, e);
                continue;
            }
            tracing::info!(
                "Resuming close of {} after {}",
                project,
                marker.stage.label()
            );

            let mut report = CloseReport::new(project.clone());
            report.resumed_from = Some(marker.stage);
            match self.drive(marker, report).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!("Resumed close of {} failed: {}", project, e),
            }
        }

        Ok(reports)
    }

    /// Runs [`Self::resume_pending`] on its own task so callers can start
    /// polling and drawing right away. Failures are logged.
    pub fn spawn_resume(&self) -> tokio::task::JoinHandle<Vec<CloseReport>> {
        let manager = self.clone();
        tokio::spawn(async move {
            match manager.resume_pending().await {
                Ok(reports) => {
                    for report in &reports {
                        tracing::info!("Resumed: {}", report.summary());
                    }
                    reports
                }
                Err(e) => {
                    tracing::warn!("Failed to scan for interrupted closes: {:#}", e);
                    Vec::new()
                }
            }
        })
    }

    async fn drive(
        &self,
        mut marker: CloseMarker,
        mut report: CloseReport,
    ) -> Result<CloseReport, LifecycleError> {
        let project = marker.project.clone();
        let result = self.run_stages(&mut marker, &mut report).await;
        if let Err(e) = result {
            self.store.abort_close(&project).await;
            return Err(e);
        }

        let dropped = self.store.unassign_all(&project).await;
        tracing::debug!("Dropped {} assignment(s) of {}", dropped.len(), project);
        let snapshot = self.store.finish_close(&project).await;
        if let Err(e) = self.files.persist(&snapshot).await {
            tracing::warn!("Failed to persist after closing {}: {:#}", project, e);
        }
        if let Err(e) = self.files.clear_marker(&project).await {
            tracing::warn!("Failed to clear close marker for {}: {:#}", project, e);
        }

        tracing::info!("{}", report.summary());
        Ok(report)
    }

    async fn run_stages(
        &self,
        marker: &mut CloseMarker,
        report: &mut CloseReport,
    ) -> Result<(), LifecycleError> {
        let project = marker.project.clone();
        let stage_error = |stage: CloseStage, source: anyhow::Error| LifecycleError::Stage {
            project: project.clone(),
            stage: stage.label(),
            source,
        };

        if !marker.completed(CloseStage::SnapshotRotation) {
            let snapshot = self.store.get().await;
            if let Err(e) = self.files.persist(&snapshot).await {
                tracing::warn!("Flush before rotating {} failed: {:#}", project, e);
            }
            let rotation = self
                .files
                .rotate_snapshots(&project)
                .await
                .map_err(|e| stage_error(CloseStage::SnapshotRotation, e))?;
            report.rotation = Some(rotation);
            self.advance(marker, CloseStage::SnapshotRotation)
                .await
                .map_err(|e| stage_error(CloseStage::SnapshotRotation, e))?;
        }

        if !marker.completed(CloseStage::WindowsClosing) {
            self.close_windows(&marker.windows, report).await;
            self.advance(marker, CloseStage::WindowsClosing)
                .await
                .map_err(|e| stage_error(CloseStage::WindowsClosing, e))?;
        }

        if !marker.completed(CloseStage::NotesCapture) {
            if let Some(notes) = marker.notes.as_deref() {
                self.files
                    .write_notes(&project, notes)
                    .await
                    .map_err(|e| stage_error(CloseStage::NotesCapture, e))?;
                report.notes_saved = true;
            }
            self.advance(marker, CloseStage::NotesCapture)
                .await
                .map_err(|e| stage_error(CloseStage::NotesCapture, e))?;
        }

        if !marker.completed(CloseStage::VcsUpload) {
            if marker.push {
                report.vcs = self.upload(&project).await;
            }
            self.advance(marker, CloseStage::VcsUpload)
                .await
                .map_err(|e| stage_error(CloseStage::VcsUpload, e))?;
        }

        Ok(())
    }

    async fn advance(&self, marker: &mut CloseMarker, stage: CloseStage) -> anyhow::Result<()> {
        marker.stage = stage;
        self.files
            .write_marker(marker)
            .await
            .with_context(|| format!("Failed to record stage {}", stage.label()))
    }

    async fn close_windows(&self, targets: &[CloseTarget], report: &mut CloseReport) {
        for target in targets {
            let result =
                tokio::time::timeout(self.window_close_timeout, self.source.close(target)).await;
            let reason = match result {
                Ok(Ok(())) => {
                    if let Some(key) = &target.key {
                        self.store.remove(key).await;
                    }
                    report.closed.push(target.title.clone());
                    continue;
                }
                Ok(Err(e)) => format!("{:#}", e),
                Err(_) => format!("timed out after {:?}", self.window_close_timeout),
            };
            tracing::warn!("Could not close {:?}: {}", target.title, reason);
            report.close_failures.push(CloseFailure {
                title: target.title.clone(),
                reason,
            });
        }
    }

    async fn upload(&self, project: &ProjectName) -> VcsStatus {
        let dir = self.files.project_dir(project);
        match tokio::time::timeout(self.vcs_timeout, self.vcs.commit_and_push(&dir)).await {
            Ok(Ok(outcome)) => VcsStatus::Pushed(outcome),
            Ok(Err(e)) => {
                tracing::warn!("Push of {} failed: {}", project, e);
                VcsStatus::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!("Push of {} timed out", project);
                VcsStatus::Failed(format!("timed out after {:?}", self.vcs_timeout))
            }
        }
    }

    /// Commits and pushes a project folder outside of a close.
    pub async fn push(&self, project: &str) -> Result<VcsStatus, LifecycleError> {
        let project = ProjectName::parse(project)?;
        if !self.files.project_dir(&project).exists() {
            return Err(LifecycleError::UnknownProject(project));
        }
        if !self.vcs_enabled {
            return Ok(VcsStatus::Skipped);
        }
        Ok(self.upload(&project).await)
    }
}
