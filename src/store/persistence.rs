use anyhow::{Context, Result};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::fs;
use tokio::sync::Mutex;

use super::assignment::StoreSnapshot;
use crate::config::Config;
use crate::models::{CloseMarker, ProjectName, WindowKey, WindowMetadata};

const CURRENT_FILE: &str = "current_programs.json";
const SAVED_STATES_DIR: &str = "Savedstates";
const LAST_STATE_DIR: &str = "LastState";
const STATE_FILE: &str = "state";
const NOTES_FILE: &str = "closing_notes";
const MARKER_FILE: &str = ".closing.json";

/// Result of rotating a project's snapshot history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationOutcome {
    /// Number assigned to the archived copy of the previous LastState.
    pub archived: Option<u32>,
    pub last_state_updated: bool,
}

/// What the last `persist` call left on disk.
#[derive(Debug, Default)]
struct WriteState {
    revision: Option<u64>,
    /// Projects whose current-state file was last written with live windows.
    populated: BTreeSet<ProjectName>,
}

/// On-disk layout under the projects directory.
pub struct ProjectFiles {
    root: PathBuf,
    assignments_file: String,
    written: Mutex<WriteState>,
}

impl ProjectFiles {
    pub fn new(root: PathBuf, assignments_file: impl Into<String>) -> Self {
        Self {
            root,
            assignments_file: assignments_file.into(),
            written: Mutex::new(WriteState::default()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.projects_path.clone(), config.assignments_file.clone())
    }

    pub fn assignments_path(&self) -> PathBuf {
        self.root.join(&self.assignments_file)
    }

    pub fn project_dir(&self, project: &ProjectName) -> PathBuf {
        self.root.join(project.as_str())
    }

    pub fn current_path(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join(CURRENT_FILE)
    }

    fn saved_states_dir(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join(SAVED_STATES_DIR)
    }

    pub fn last_state_path(&self, project: &ProjectName) -> PathBuf {
        self.saved_states_dir(project)
            .join(LAST_STATE_DIR)
            .join(STATE_FILE)
    }

    pub fn snapshot_path(&self, project: &ProjectName, id: u32) -> PathBuf {
        self.saved_states_dir(project)
            .join(format!("{STATE_FILE}{id}"))
    }

    pub fn notes_path(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join(NOTES_FILE)
    }

    fn marker_path(&self, project: &ProjectName) -> PathBuf {
        self.project_dir(project).join(MARKER_FILE)
    }

    pub async fn load_assignments(&self) -> Result<BTreeMap<WindowKey, ProjectName>> {
        let raw: BTreeMap<String, String> = match read_json(&self.assignments_path()).await? {
            Some(raw) => raw,
            None => return Ok(BTreeMap::new()),
        };

        let mut assignments = BTreeMap::new();
        for (key, project) in raw {
            match ProjectName::parse(&project) {
                Ok(project) => {
                    assignments.insert(WindowKey::from(key.as_str()), project);
                }
                Err(e) => tracing::warn!("Ignoring assignment of {:?}: {}", key, e),
            }
        }
        Ok(assignments)
    }

    pub async fn write_assignments(
        &self,
        assignments: &BTreeMap<WindowKey, ProjectName>,
    ) -> Result<()> {
        write_json_atomic(&self.assignments_path(), assignments).await
    }

    pub async fn read_project_record(
        &self,
        project: &ProjectName,
    ) -> Result<Option<BTreeMap<WindowKey, WindowMetadata>>> {
        read_json(&self.current_path(project)).await
    }

    pub async fn write_project_record(
        &self,
        project: &ProjectName,
        record: &BTreeMap<WindowKey, WindowMetadata>,
    ) -> Result<()> {
        write_json_atomic(&self.current_path(project), record).await
    }

    /// Writes the assignment file and every project's current-state file.
    ///
    /// A project whose last live window left since the previous write gets an
    /// empty record. Records of projects not populated by this process are
    /// left as they are. Snapshots older than the last one written are
    /// skipped. Per-project failures don't stop the remaining writes.
    pub async fn persist(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let mut written = self.written.lock().await;
        if written.revision.is_some_and(|rev| rev > snapshot.revision) {
            tracing::debug!(
                "Skipping stale snapshot revision {} (last written {:?})",
                snapshot.revision,
                written.revision
            );
            return Ok(());
        }

        let mut failures = 0usize;
        if let Err(e) = self.write_assignments(&snapshot.assignments).await {
            tracing::warn!("Failed to write assignments: {:#}", e);
            failures += 1;
        }

        let mut groups = snapshot.groups();
        groups.remove(&ProjectName::unassigned());

        let emptied: Vec<ProjectName> = written
            .populated
            .iter()
            .filter(|project| !groups.contains_key(*project))
            .cloned()
            .collect();
        for project in emptied {
            match self.write_project_record(&project, &BTreeMap::new()).await {
                Ok(()) => {
                    written.populated.remove(&project);
                }
                Err(e) => {
                    tracing::warn!("Failed to clear state for {}: {:#}", project, e);
                    failures += 1;
                }
            }
        }

        for (project, record) in groups {
            match self.write_project_record(&project, &record).await {
                Ok(()) => {
                    written.populated.insert(project);
                }
                Err(e) => {
                    tracing::warn!("Failed to write state for {}: {:#}", project, e);
                    failures += 1;
                }
            }
        }

        written.revision = Some(snapshot.revision);
        if failures > 0 {
            anyhow::bail!("{} persistence write(s) failed", failures);
        }
        Ok(())
    }

    pub async fn list_snapshot_ids(&self, project: &ProjectName) -> Result<Vec<u32>> {
        let dir = self.saved_states_dir(project);
        let mut ids = Vec::new();
        if !dir.exists() {
            return Ok(ids);
        }

        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list {:?}", dir))?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(parse_snapshot_id) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Archives LastState as `state{max+1}`, then copies the current-state
    /// file over LastState. Missing sources skip their copy.
    pub async fn rotate_snapshots(&self, project: &ProjectName) -> Result<RotationOutcome> {
        let next = self
            .list_snapshot_ids(project)
            .await?
            .last()
            .map_or(1, |max| max + 1);

        let last_state = self.last_state_path(project);
        let archived = copy_atomic(&last_state, &self.snapshot_path(project, next))
            .await?
            .then_some(next);
        let last_state_updated = copy_atomic(&self.current_path(project), &last_state).await?;

        Ok(RotationOutcome {
            archived,
            last_state_updated,
        })
    }

    pub async fn write_notes(&self, project: &ProjectName, notes: &str) -> Result<()> {
        write_atomic(&self.notes_path(project), notes.as_bytes()).await
    }

    pub async fn write_marker(&self, marker: &CloseMarker) -> Result<()> {
        write_json_atomic(&self.marker_path(&marker.project), marker).await
    }

    pub async fn read_marker(&self, project: &ProjectName) -> Result<Option<CloseMarker>> {
        read_json(&self.marker_path(project)).await
    }

    pub async fn clear_marker(&self, project: &ProjectName) -> Result<()> {
        match fs::remove_file(self.marker_path(project)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove close marker"),
        }
    }

    pub async fn list_markers(&self) -> Result<Vec<CloseMarker>> {
        let mut markers = Vec::new();
        for project in self.list_projects().await? {
            match self.read_marker(&project).await {
                Ok(Some(marker)) => markers.push(marker),
                Ok(None) => {}
                Err(e) => tracing::warn!("Unreadable close marker for {}: {:#}", project, e),
            }
        }
        Ok(markers)
    }

    /// Project folders under the root, hidden folders and invalid names excluded.
    pub async fn list_projects(&self) -> Result<Vec<ProjectName>> {
        let mut projects = Vec::new();
        if !self.root.exists() {
            return Ok(projects);
        }

        let mut entries = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("Failed to list {:?}", self.root))?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(project) = ProjectName::parse(&name) {
                if !project.is_unassigned() && project.as_str() == name {
                    projects.push(project);
                }
            }
        }
        projects.sort();
        Ok(projects)
    }
}

fn snapshot_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^state(\d+)$").expect("snapshot pattern is valid"))
}

fn parse_snapshot_id(name: &str) -> Option<u32> {
    snapshot_id_pattern()
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
    };
    let value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(Some(value))
}

async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_atomic(path, content.as_bytes()).await
}

/// Writes to a hidden sibling first and renames it into place.
async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("{:?} has no parent directory", path))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("Failed to create {:?}", parent))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{:?} has no file name", path))?;
    let tmp = parent.join(format!(".{file_name}.tmp"));

    fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move {:?} into place", path))?;
    Ok(())
}

/// Returns false when the source does not exist.
async fn copy_atomic(from: &Path, to: &Path) -> Result<bool> {
    let content = match fs::read(from).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", from)),
    };
    write_atomic(to, &content).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WindowRecord, UNASSIGNED};
    use chrono::Utc;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn create_test_files() -> (ProjectFiles, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let files = ProjectFiles::new(temp_dir.path().to_path_buf(), "top_assignments.json");
        (files, temp_dir)
    }

    fn project(name: &str) -> ProjectName {
        ProjectName::parse(name).unwrap()
    }

    fn snapshot_with(revision: u64, entries: &[(&str, &str)]) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot {
            revision,
            ..StoreSnapshot::default()
        };
        for (title, name) in entries {
            let key = WindowKey::from_title(title);
            snapshot.assignments.insert(key.clone(), project(name));
            snapshot.windows.insert(
                key.clone(),
                WindowRecord {
                    key,
                    first_seen: Utc::now(),
                    metadata: WindowMetadata::titled(*title),
                },
            );
        }
        snapshot
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn persist_matches_store_after_concurrent_mutations() {
        use crate::store::AssignmentStore;
        use std::sync::Arc;

        let (files, _temp) = create_test_files();
        let files = Arc::new(files);
        let store = AssignmentStore::new();
        let titles = ["a", "b", "c", "d"];
        let live = |titles: &[&str]| -> Vec<WindowRecord> {
            titles
                .iter()
                .map(|t| WindowRecord {
                    key: WindowKey::from_title(t),
                    first_seen: Utc::now(),
                    metadata: WindowMetadata::titled(*t),
                })
                .collect()
        };
        store.reconcile(live(&titles[..])).await;

        let mut tasks = Vec::new();
        for worker in 0..3 {
            let (store, files) = (store.clone(), files.clone());
            tasks.push(tokio::spawn(async move {
                for round in 0..30 {
                    let title = titles[(worker + round) % titles.len()];
                    let target = ["P1", "P2", UNASSIGNED][round % 3];
                    if let Ok(outcome) = store.assign(&[WindowKey::from_title(title)], target).await {
                        let _ = files.persist(&outcome.snapshot).await;
                    }
                }
            }));
        }
        {
            let (store, files) = (store.clone(), files.clone());
            tasks.push(tokio::spawn(async move {
                for round in 0..30 {
                    let shown = if round % 4 == 0 { &titles[..2] } else { &titles[..] };
                    let (_, snapshot) = store.reconcile(live(shown)).await;
                    let _ = files.persist(&snapshot).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = store.get().await;
        files.persist(&snapshot).await.unwrap();

        assert_eq!(files.load_assignments().await.unwrap(), snapshot.assignments);
        let groups = snapshot.groups();
        for name in ["P1", "P2"] {
            let record = files
                .read_project_record(&project(name))
                .await
                .unwrap()
                .unwrap_or_default();
            assert_eq!(record, groups.get(&project(name)).cloned().unwrap_or_default());
        }
    }

    #[test]
    fn from_config_places_assignments_under_projects_path() {
        let config = Config::default().with_projects_path(PathBuf::from("/tmp/projects"));
        let files = ProjectFiles::from_config(&config);
        assert_eq!(
            files.assignments_path(),
            PathBuf::from("/tmp/projects/top_assignments.json")
        );
    }

    #[tokio::test]
    async fn persist_writes_assignments_and_project_records() {
        let (files, _temp) = create_test_files();
        let snapshot = snapshot_with(1, &[("Editor - app.py", "Proj1"), ("Chat", UNASSIGNED)]);

        files.persist(&snapshot).await.unwrap();

        let assignments = files.load_assignments().await.unwrap();
        assert_eq!(assignments.len(), 2);
        let record = files
            .read_project_record(&project("Proj1"))
            .await
            .unwrap()
            .unwrap();
        assert!(record.contains_key(&WindowKey::from_title("Editor - app.py")));
        assert!(
            !files.project_dir(&ProjectName::unassigned()).exists(),
            "persist: Unassigned never gets a project folder"
        );
    }

    #[tokio::test]
    async fn persist_skips_stale_revisions() {
        let (files, _temp) = create_test_files();

        files
            .persist(&snapshot_with(5, &[("New", "Proj1")]))
            .await
            .unwrap();
        files
            .persist(&snapshot_with(3, &[("Old", "Proj1")]))
            .await
            .unwrap();

        let assignments = files.load_assignments().await.unwrap();
        assert!(assignments.contains_key(&WindowKey::from_title("New")));
        assert!(!assignments.contains_key(&WindowKey::from_title("Old")));
    }

    #[tokio::test]
    async fn persist_clears_record_when_last_window_leaves() {
        let (files, _temp) = create_test_files();
        files
            .persist(&snapshot_with(1, &[("Editor", "Proj1")]))
            .await
            .unwrap();

        files
            .persist(&snapshot_with(2, &[("Editor", "Proj2")]))
            .await
            .unwrap();

        let old = files
            .read_project_record(&project("Proj1"))
            .await
            .unwrap()
            .unwrap();
        assert!(old.is_empty(), "persist: emptied group should be rewritten as empty");
        let new = files
            .read_project_record(&project("Proj2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(new.len(), 1);

        files.persist(&snapshot_with(3, &[])).await.unwrap();
        let closed = files
            .read_project_record(&project("Proj2"))
            .await
            .unwrap()
            .unwrap();
        assert!(closed.is_empty());
    }

    #[tokio::test]
    async fn persist_leaves_records_from_earlier_runs_alone() {
        let (files, _temp) = create_test_files();
        let mut record = BTreeMap::new();
        record.insert(WindowKey::from_title("Editor"), WindowMetadata::titled("Editor"));
        files
            .write_project_record(&project("Proj1"), &record)
            .await
            .unwrap();

        files.persist(&snapshot_with(1, &[])).await.unwrap();

        let kept = files
            .read_project_record(&project("Proj1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.len(), 1, "persist: only groups emptied in this run are cleared");
    }

    #[tokio::test]
    async fn load_assignments_missing_file_is_empty() {
        let (files, _temp) = create_test_files();
        assert!(files.load_assignments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_assignments_skips_invalid_project_names() {
        let (files, _temp) = create_test_files();
        std::fs::write(
            files.assignments_path(),
            r#"{"Editor": "Proj1", "Shell": "../escape"}"#,
        )
        .unwrap();

        let assignments = files.load_assignments().await.unwrap();
        assert_eq!(assignments.len(), 1);
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let (files, temp) = create_test_files();
        files.write_assignments(&BTreeMap::new()).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn rotate_snapshots_without_history_only_updates_last_state() {
        let (files, _temp) = create_test_files();
        let p = project("Proj1");
        files
            .write_project_record(&p, &BTreeMap::new())
            .await
            .unwrap();

        let outcome = files.rotate_snapshots(&p).await.unwrap();

        assert_eq!(outcome.archived, None);
        assert!(outcome.last_state_updated);
        assert!(files.last_state_path(&p).exists());
        assert!(!files.snapshot_path(&p, 1).exists());
    }

    #[tokio::test]
    async fn rotate_snapshots_archives_previous_last_state() {
        let (files, _temp) = create_test_files();
        let p = project("Proj1");
        std::fs::create_dir_all(files.last_state_path(&p).parent().unwrap()).unwrap();
        std::fs::write(files.last_state_path(&p), "previous").unwrap();
        std::fs::write(files.current_path(&p), "current").unwrap();

        let outcome = files.rotate_snapshots(&p).await.unwrap();

        assert_eq!(outcome.archived, Some(1));
        assert_eq!(
            std::fs::read_to_string(files.snapshot_path(&p, 1)).unwrap(),
            "previous"
        );
        assert_eq!(
            std::fs::read_to_string(files.last_state_path(&p)).unwrap(),
            "current"
        );
    }

    #[tokio::test]
    async fn rotate_snapshots_numbers_after_highest_existing() {
        let (files, _temp) = create_test_files();
        let p = project("Proj1");
        std::fs::create_dir_all(files.last_state_path(&p).parent().unwrap()).unwrap();
        std::fs::write(files.last_state_path(&p), "x").unwrap();
        std::fs::write(files.snapshot_path(&p, 2), "two").unwrap();
        std::fs::write(files.snapshot_path(&p, 7), "seven").unwrap();

        let outcome = files.rotate_snapshots(&p).await.unwrap();

        assert_eq!(outcome.archived, Some(8), "rotate: gaps are never refilled");
        assert_eq!(files.list_snapshot_ids(&p).await.unwrap(), vec![2, 7, 8]);
        assert!(!outcome.last_state_updated);
    }

    #[tokio::test]
    async fn marker_write_read_clear() {
        let (files, _temp) = create_test_files();
        let marker = CloseMarker::new(project("Proj1"), Vec::new(), None, true);

        files.write_marker(&marker).await.unwrap();
        assert_eq!(files.read_marker(&marker.project).await.unwrap(), Some(marker.clone()));
        assert_eq!(files.list_markers().await.unwrap().len(), 1);

        files.clear_marker(&marker.project).await.unwrap();
        assert_eq!(files.read_marker(&marker.project).await.unwrap(), None);
        files.clear_marker(&marker.project).await.unwrap();
    }

    #[tokio::test]
    async fn list_projects_skips_hidden_and_files() {
        let (files, temp) = create_test_files();
        std::fs::create_dir(temp.path().join("Proj1")).unwrap();
        std::fs::create_dir(temp.path().join(".cache")).unwrap();
        std::fs::create_dir(temp.path().join("Unassigned")).unwrap();
        std::fs::write(temp.path().join("top_assignments.json"), "{}").unwrap();

        let projects = files.list_projects().await.unwrap();
        assert_eq!(projects, vec![project("Proj1")]);
    }

    #[test]
    fn parse_snapshot_id_accepts_only_numbered_states() {
        assert_eq!(parse_snapshot_id("state12"), Some(12));
        assert_eq!(parse_snapshot_id("state"), None);
        assert_eq!(parse_snapshot_id("LastState"), None);
        assert_eq!(parse_snapshot_id("state3.tmp"), None);
    }

    proptest! {
        #[test]
        fn rotate_snapshots_numbering_is_strictly_increasing(closes in 1usize..8, seeded in any::<bool>()) {
            tokio_test::block_on(async {
                let (files, _temp) = create_test_files();
                let p = project("Proj1");
                if seeded {
                    std::fs::create_dir_all(files.last_state_path(&p).parent().unwrap()).unwrap();
                    std::fs::write(files.last_state_path(&p), "seed").unwrap();
                }

                std::fs::create_dir_all(files.project_dir(&p)).unwrap();
                for i in 0..closes {
                    std::fs::write(files.current_path(&p), format!("close {i}")).unwrap();
                    files.rotate_snapshots(&p).await.unwrap();
                }

                let ids = files.list_snapshot_ids(&p).await.unwrap();
                let expected = if seeded { closes } else { closes - 1 };
                prop_assert_eq!(ids.clone(), (1..=expected as u32).collect::<Vec<_>>());
                prop_assert_eq!(
                    std::fs::read_to_string(files.last_state_path(&p)).unwrap(),
                    format!("close {}", closes - 1)
                );
                Ok(())
            })?;
        }
    }
}
