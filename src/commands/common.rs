use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::engine::{EngineHandle, ReconciliationEngine};
use crate::lifecycle::{GitClient, ProjectLifecycleManager};
use crate::store::{AssignmentStore, ProjectFiles};
use crate::windows::{WindowSource, WmctrlSource};

/// Shared wiring for every subcommand: one store, one set of project files,
/// one window source.
pub struct Services {
    pub config: Config,
    pub store: AssignmentStore,
    pub files: Arc<ProjectFiles>,
    pub source: Arc<dyn WindowSource>,
    pub lifecycle: ProjectLifecycleManager,
}

impl Services {
    pub fn new(config: Config) -> Self {
        let store = AssignmentStore::new();
        let files = Arc::new(ProjectFiles::from_config(&config));
        let source: Arc<dyn WindowSource> = Arc::new(WmctrlSource::new());
        let lifecycle = ProjectLifecycleManager::new(
            store.clone(),
            files.clone(),
            source.clone(),
            Arc::new(GitClient::from_config(&config.vcs)),
            &config,
        );

        Self {
            config,
            store,
            files,
            source,
            lifecycle,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle::new(self.store.clone(), self.files.clone())
    }

    /// Builds an engine with the saved assignments and project folders loaded.
    pub async fn restored_engine(&self) -> Result<ReconciliationEngine> {
        let engine = ReconciliationEngine::new(
            self.source.clone(),
            self.store.clone(),
            self.files.clone(),
            &self.config,
        );
        engine.restore().await?;
        Ok(engine)
    }
}
