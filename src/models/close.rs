use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CloseTarget, ProjectName};

/// Stages of closing a project, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseStage {
    Active,
    SnapshotRotation,
    WindowsClosing,
    NotesCapture,
    VcsUpload,
    Removed,
}

impl CloseStage {
    pub fn label(&self) -> &'static str {
        match self {
            CloseStage::Active => "active",
            CloseStage::SnapshotRotation => "snapshot rotation",
            CloseStage::WindowsClosing => "closing windows",
            CloseStage::NotesCapture => "notes capture",
            CloseStage::VcsUpload => "vcs upload",
            CloseStage::Removed => "removed",
        }
    }
}

/// On-disk record of an in-flight close. `stage` is the last completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseMarker {
    pub project: ProjectName,
    pub stage: CloseStage,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub windows: Vec<CloseTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_push")]
    pub push: bool,
}

fn default_push() -> bool {
    true
}

impl CloseMarker {
    pub fn new(
        project: ProjectName,
        windows: Vec<CloseTarget>,
        notes: Option<String>,
        push: bool,
    ) -> Self {
        Self {
            project,
            stage: CloseStage::Active,
            started_at: Utc::now(),
            windows,
            notes: notes.filter(|n| !n.trim().is_empty()),
            push,
        }
    }

    pub fn completed(&self, stage: CloseStage) -> bool {
        self.stage >= stage
    }
}
