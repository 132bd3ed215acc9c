use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

use crate::models::{
    ProjectName, ProjectNameError, StoreEvent, WindowKey, WindowMetadata, WindowRecord,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No windows selected")]
    NothingSelected,

    #[error(transparent)]
    InvalidProject(#[from] ProjectNameError),

    #[error("Project {0} is closing")]
    ProjectClosing(ProjectName),

    #[error("Project {0} is already being closed")]
    AlreadyClosing(ProjectName),

    #[error("The {0} bucket cannot be closed")]
    CannotCloseUnassigned(ProjectName),
}

/// Windows grouped by their assigned project, with latest metadata.
pub type ProjectGroups = BTreeMap<ProjectName, BTreeMap<WindowKey, WindowMetadata>>;

/// Consistent copy of the store taken under its lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub assignments: BTreeMap<WindowKey, ProjectName>,
    pub pending: BTreeSet<WindowKey>,
    pub windows: BTreeMap<WindowKey, WindowRecord>,
    pub projects: BTreeSet<ProjectName>,
    pub closing: BTreeSet<ProjectName>,
}

impl StoreSnapshot {
    /// Live windows per project. Projects whose windows are all gone are
    /// absent.
    pub fn groups(&self) -> ProjectGroups {
        let mut groups = ProjectGroups::new();
        for (key, project) in &self.assignments {
            if let Some(record) = self.windows.get(key) {
                groups
                    .entry(project.clone())
                    .or_default()
                    .insert(key.clone(), record.metadata.clone());
            }
        }
        groups
    }

    pub fn project_of(&self, key: &WindowKey) -> Option<&ProjectName> {
        self.assignments.get(key)
    }

    pub fn windows_of(&self, project: &ProjectName) -> Vec<&WindowRecord> {
        self.assignments
            .iter()
            .filter(|(_, p)| *p == project)
            .filter_map(|(key, _)| self.windows.get(key))
            .collect()
    }

    pub fn is_known_project(&self, project: &ProjectName) -> bool {
        self.projects.contains(project) || self.assignments.values().any(|p| p == project)
    }
}

/// What one reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub live: usize,
    pub new_pending: Vec<WindowKey>,
    pub removed: Vec<(WindowKey, Option<ProjectName>)>,
}

impl CycleReport {
    pub fn is_quiet(&self) -> bool {
        self.new_pending.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AssignOutcome {
    pub project: ProjectName,
    pub assigned: Vec<WindowKey>,
    pub skipped: Vec<WindowKey>,
    pub snapshot: StoreSnapshot,
}

#[derive(Debug, Default)]
struct StoreState {
    revision: u64,
    assignments: BTreeMap<WindowKey, ProjectName>,
    pending: BTreeSet<WindowKey>,
    windows: BTreeMap<WindowKey, WindowRecord>,
    projects: BTreeSet<ProjectName>,
    closing: BTreeSet<ProjectName>,
}

impl StoreState {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            revision: self.revision,
            assignments: self.assignments.clone(),
            pending: self.pending.clone(),
            windows: self.windows.clone(),
            projects: self.projects.clone(),
            closing: self.closing.clone(),
        }
    }

    fn group_sizes(&self) -> BTreeMap<ProjectName, usize> {
        let mut sizes = BTreeMap::new();
        for (key, project) in &self.assignments {
            if self.windows.contains_key(key) {
                *sizes.entry(project.clone()).or_insert(0) += 1;
            }
        }
        sizes
    }

    fn register(&mut self, project: &ProjectName) {
        if !project.is_unassigned() {
            self.projects.insert(project.clone());
        }
    }
}

/// Authoritative window-to-project mapping. Every mutation happens inside a
/// single lock acquisition and never awaits while holding it.
#[derive(Clone)]
pub struct AssignmentStore {
    state: Arc<Mutex<StoreState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for AssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, events: Vec<StoreEvent>) {
        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    pub async fn get(&self) -> StoreSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Seeds assignments and known projects from disk.
    pub async fn restore(
        &self,
        assignments: BTreeMap<WindowKey, ProjectName>,
        projects: impl IntoIterator<Item = ProjectName>,
    ) {
        let mut state = self.state.lock().await;
        for project in projects.into_iter().chain(assignments.values().cloned()) {
            state.register(&project);
        }
        for (key, project) in assignments {
            state.pending.remove(&key);
            state.assignments.insert(key, project);
        }
        state.revision += 1;
    }

    pub async fn register_project(&self, project: &ProjectName) {
        let mut state = self.state.lock().await;
        if !project.is_unassigned() && state.projects.insert(project.clone()) {
            state.revision += 1;
        }
    }

    pub async fn assign(
        &self,
        keys: &[WindowKey],
        project: &str,
    ) -> Result<AssignOutcome, StoreError> {
        if keys.is_empty() {
            return Err(StoreError::NothingSelected);
        }
        let project = ProjectName::parse(project)?;

        let mut events = Vec::new();
        let outcome = {
            let mut state = self.state.lock().await;
            if state.closing.contains(&project) {
                return Err(StoreError::ProjectClosing(project));
            }
            // Windows of a closing project are already targeted for close.
            if let Some(current) = keys
                .iter()
                .filter_map(|key| state.assignments.get(key))
                .find(|current| state.closing.contains(*current))
            {
                return Err(StoreError::ProjectClosing(current.clone()));
            }

            let before = state.group_sizes();
            let mut assigned = Vec::new();
            let mut skipped = Vec::new();
            let mut changed = false;

            for key in keys {
                if !state.windows.contains_key(key) {
                    skipped.push(key.clone());
                    continue;
                }
                state.pending.remove(key);
                let previous = state.assignments.insert(key.clone(), project.clone());
                if previous.as_ref() != Some(&project) {
                    changed = true;
                    events.push(StoreEvent::WindowAssigned {
                        key: key.clone(),
                        project: project.clone(),
                        previous,
                    });
                }
                assigned.push(key.clone());
            }

            if !project.is_unassigned() && state.projects.insert(project.clone()) {
                changed = true;
            }
            if changed {
                state.revision += 1;
                events.extend(group_changes(&before, &state.group_sizes()));
            }

            AssignOutcome {
                project,
                assigned,
                skipped,
                snapshot: state.snapshot(),
            }
        };

        self.emit(events);
        Ok(outcome)
    }

    /// Drops every assignment to the project. The windows are not returned
    /// to pending.
    pub async fn unassign_all(&self, project: &ProjectName) -> Vec<WindowKey> {
        let mut events = Vec::new();
        let keys = {
            let mut state = self.state.lock().await;
            let before = state.group_sizes();
            let keys: Vec<WindowKey> = state
                .assignments
                .iter()
                .filter(|(_, p)| *p == project)
                .map(|(k, _)| k.clone())
                .collect();
            for key in &keys {
                state.assignments.remove(key);
            }
            if !keys.is_empty() {
                state.revision += 1;
                events.extend(group_changes(&before, &state.group_sizes()));
            }
            keys
        };
        self.emit(events);
        keys
    }

    /// Forgets a window everywhere. Returns false when it was not tracked.
    pub async fn remove(&self, key: &WindowKey) -> bool {
        let mut events = Vec::new();
        let removed = {
            let mut state = self.state.lock().await;
            let before = state.group_sizes();
            let project = state.assignments.remove(key);
            let pending = state.pending.remove(key);
            let record = state.windows.remove(key);
            let removed = project.is_some() || pending || record.is_some();
            if removed {
                state.revision += 1;
                events.push(StoreEvent::WindowRemoved {
                    key: key.clone(),
                    title: record
                        .map(|r| r.metadata.title)
                        .unwrap_or_else(|| key.to_string()),
                    project,
                });
                events.extend(group_changes(&before, &state.group_sizes()));
            }
            removed
        };
        self.emit(events);
        removed
    }

    /// Applies one poll cycle's live window set.
    ///
    /// Closed windows are dropped from every structure before new windows are
    /// queued as pending, and the returned snapshot reflects both.
    pub async fn reconcile(&self, records: Vec<WindowRecord>) -> (CycleReport, StoreSnapshot) {
        let live: BTreeMap<WindowKey, WindowRecord> =
            records.into_iter().map(|r| (r.key.clone(), r)).collect();

        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock().await;
            let before = state.group_sizes();
            let mut report = CycleReport {
                live: live.len(),
                ..CycleReport::default()
            };

            let tracked: BTreeSet<WindowKey> = state
                .assignments
                .keys()
                .chain(state.pending.iter())
                .chain(state.windows.keys())
                .cloned()
                .collect();

            for key in tracked.into_iter().filter(|k| !live.contains_key(k)) {
                let project = state.assignments.remove(&key);
                state.pending.remove(&key);
                let title = state
                    .windows
                    .remove(&key)
                    .map(|r| r.metadata.title)
                    .unwrap_or_else(|| key.to_string());
                events.push(StoreEvent::WindowRemoved {
                    key: key.clone(),
                    title,
                    project: project.clone(),
                });
                report.removed.push((key, project));
            }

            for (key, record) in &live {
                if !state.assignments.contains_key(key) && state.pending.insert(key.clone()) {
                    events.push(StoreEvent::WindowPending {
                        key: key.clone(),
                        title: record.metadata.title.clone(),
                    });
                    report.new_pending.push(key.clone());
                }
            }

            let metadata_changed = state.windows != live;
            state.windows = live;
            if metadata_changed || !report.is_quiet() {
                state.revision += 1;
            }
            events.extend(group_changes(&before, &state.group_sizes()));

            (report, state.snapshot())
        };

        self.emit(events);
        result
    }

    /// Marks a project as closing and returns its live windows.
    pub async fn begin_close(&self, project: &ProjectName) -> Result<Vec<WindowRecord>, StoreError> {
        if project.is_unassigned() {
            return Err(StoreError::CannotCloseUnassigned(project.clone()));
        }
        let mut state = self.state.lock().await;
        if !state.closing.insert(project.clone()) {
            return Err(StoreError::AlreadyClosing(project.clone()));
        }
        Ok(state
            .assignments
            .iter()
            .filter(|(_, p)| *p == project)
            .filter_map(|(key, _)| state.windows.get(key).cloned())
            .collect())
    }

    /// Removes the project from the registry and ends its close.
    pub async fn finish_close(&self, project: &ProjectName) -> StoreSnapshot {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.projects.remove(project);
            state.closing.remove(project);
            state.revision += 1;
            state.snapshot()
        };
        self.emit(vec![StoreEvent::ProjectClosed {
            project: project.clone(),
        }]);
        snapshot
    }

    pub async fn abort_close(&self, project: &ProjectName) {
        self.state.lock().await.closing.remove(project);
    }
}

fn group_changes(
    before: &BTreeMap<ProjectName, usize>,
    after: &BTreeMap<ProjectName, usize>,
) -> Vec<StoreEvent> {
    before
        .keys()
        .chain(after.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|project| {
            let old = before.get(project).copied().unwrap_or(0);
            let new = after.get(project).copied().unwrap_or(0);
            (old != new).then(|| StoreEvent::ProjectGroupUpdated {
                project: project.clone(),
                windows: new,
            })
        })
        .collect()
}
