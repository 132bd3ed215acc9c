use std::sync::Arc;

use crate::models::WindowKey;
use crate::store::assignment::AssignOutcome;
use crate::store::{AssignmentStore, ProjectFiles, StoreError};

/// User-facing entry point for assignment actions.
///
/// Assignments are persisted right away instead of waiting for the next poll.
#[derive(Clone)]
pub struct EngineHandle {
    store: AssignmentStore,
    files: Arc<ProjectFiles>,
}

impl EngineHandle {
    pub fn new(store: AssignmentStore, files: Arc<ProjectFiles>) -> Self {
        Self { store, files }
    }

    pub fn store(&self) -> &AssignmentStore {
        &self.store
    }

    pub async fn assign(
        &self,
        keys: &[WindowKey],
        project: &str,
    ) -> Result<AssignOutcome, StoreError> {
        let outcome = self.store.assign(keys, project).await?;
        if let Err(e) = self.files.persist(&outcome.snapshot).await {
            tracing::warn!("Failed to persist assignment to {}: {:#}", outcome.project, e);
        }
        tracing::info!(
            "Assigned {} window(s) to {} ({} skipped)",
            outcome.assigned.len(),
            outcome.project,
            outcome.skipped.len()
        );
        Ok(outcome)
    }
}
