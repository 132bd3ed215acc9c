use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::engine::EngineHandle;
use crate::lifecycle::{CloseReport, LifecycleError, ProjectLifecycleManager};
use crate::models::{ProjectName, StoreEvent, UNASSIGNED};
use crate::store::StoreSnapshot;

use super::ui::UI;
use super::widgets::{
    HelpModal, ProjectSelector, PromptPurpose, TextPrompt, WindowEntry, WindowList,
};

/// Fallback refresh interval when no store events arrive.
const REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Default)]
pub enum CloseState {
    #[default]
    Idle,
    InProgress {
        handle: JoinHandle<Result<CloseReport, LifecycleError>>,
        project: String,
    },
}

pub struct TowerApp {
    engine: EngineHandle,
    lifecycle: ProjectLifecycleManager,
    events: broadcast::Receiver<StoreEvent>,

    window_list: WindowList,
    project_selector: ProjectSelector,
    prompt: TextPrompt,
    help_modal: HelpModal,

    running: bool,
    message: Option<String>,
    last_refresh: Instant,
    close_state: CloseState,
}

impl TowerApp {
    pub fn new(engine: EngineHandle, lifecycle: ProjectLifecycleManager) -> Self {
        let events = engine.store().subscribe();
        Self {
            engine,
            lifecycle,
            events,
            window_list: WindowList::new(),
            project_selector: ProjectSelector::new(),
            prompt: TextPrompt::new(),
            help_modal: HelpModal::new(),
            running: true,
            message: None,
            last_refresh: Instant::now(),
            close_state: CloseState::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn set_message(&mut self, msg: String) {
        self.message = Some(msg);
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn window_list(&mut self) -> &mut WindowList {
        &mut self.window_list
    }

    pub fn project_selector(&self) -> &ProjectSelector {
        &self.project_selector
    }

    pub fn prompt(&self) -> &TextPrompt {
        &self.prompt
    }

    pub fn help_modal(&self) -> &HelpModal {
        &self.help_modal
    }

    pub fn closing_project(&self) -> Option<&str> {
        match &self.close_state {
            CloseState::InProgress { project, .. } => Some(project),
            CloseState::Idle => None,
        }
    }

    pub async fn refresh(&mut self) {
        let snapshot = self.engine.store().get().await;
        self.apply_snapshot(&snapshot);
        self.last_refresh = Instant::now();
    }

    fn apply_snapshot(&mut self, snapshot: &StoreSnapshot) {
        let mut entries: Vec<WindowEntry> = snapshot
            .windows
            .values()
            .map(|record| WindowEntry {
                key: record.key.clone(),
                title: record.metadata.title.clone(),
                project: snapshot.project_of(&record.key).map(|p| p.to_string()),
                process: record.metadata.process_name.clone(),
                detail: record
                    .metadata
                    .browser_url
                    .clone()
                    .or_else(|| record.metadata.editor_workspace.clone()),
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.project.is_some(), &a.project, &a.title).cmp(&(b.project.is_some(), &b.project, &b.title))
        });
        self.window_list.set_entries(entries);

        let mut projects: Vec<String> = snapshot.projects.iter().map(|p| p.to_string()).collect();
        if let Some(selected) = self.project_selector.selected() {
            // Keep a freshly typed project selectable before it owns a window
            if !projects.iter().any(|p| p == selected) && selected != UNASSIGNED {
                projects.push(selected.to_string());
            }
        }
        self.project_selector.set_projects(projects);
        self.project_selector
            .set_closing(snapshot.closing.iter().map(|p| p.to_string()).collect());
    }

    /// Drains store events; refreshes when any arrived or the fallback
    /// interval elapsed.
    async fn poll_store_events(&mut self) {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    tracing::debug!("{}", event.describe());
                    changed = true;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("Store event stream lagged by {}", skipped);
                    changed = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        if changed || self.last_refresh.elapsed() >= REFRESH_INTERVAL {
            self.refresh().await;
        }
    }

    pub async fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key).await;
                }
            }
        }
        Ok(())
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        tracing::debug!("Key pressed: {:?}", key.code);

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }

        if self.help_modal.is_visible() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('?')) {
                self.help_modal.hide();
            }
            return;
        }

        if self.prompt.is_visible() {
            self.handle_prompt_keys(key).await;
            return;
        }

        self.clear_message();

        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Char('?') => self.help_modal.toggle(),
            KeyCode::Char('j') | KeyCode::Down => self.window_list.next(),
            KeyCode::Char('k') | KeyCode::Up => self.window_list.prev(),
            KeyCode::Char(' ') => self.window_list.toggle_mark(),
            KeyCode::Esc => self.window_list.clear_marks(),
            KeyCode::Tab => self.project_selector.next(),
            KeyCode::BackTab => self.project_selector.prev(),
            KeyCode::Enter | KeyCode::Char('a') => {
                let project = self.project_selector.selected().map(str::to_string);
                self.assign_selected(project.as_deref()).await;
            }
            KeyCode::Char('u') => self.assign_selected(Some(UNASSIGNED)).await,
            KeyCode::Char('n') => self.prompt.open(PromptPurpose::NewProject),
            KeyCode::Char('c') => self.open_close_prompt(),
            _ => {}
        }
    }

    async fn handle_prompt_keys(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.prompt.close();
                self.set_message("Cancelled".to_string());
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                self.prompt.insert_newline();
            }
            KeyCode::Enter => {
                if let Some((purpose, content)) = self.prompt.close() {
                    self.submit_prompt(purpose, content).await;
                }
            }
            KeyCode::Backspace => self.prompt.delete_char(),
            KeyCode::Left => self.prompt.move_cursor_left(),
            KeyCode::Right => self.prompt.move_cursor_right(),
            KeyCode::Char(c) => self.prompt.insert_char(c),
            _ => {}
        }
    }

    async fn submit_prompt(&mut self, purpose: PromptPurpose, content: String) {
        match purpose {
            PromptPurpose::NewProject => match ProjectName::parse(&content) {
                Ok(project) => {
                    self.project_selector.add_and_select(project.as_str());
                    if self.window_list.selected().is_some() {
                        self.assign_selected(Some(project.as_str())).await;
                    } else {
                        self.engine.store().register_project(&project).await;
                        self.set_message(format!("Created project {}", project));
                    }
                }
                Err(e) => self.set_message(format!("Error: {}", e)),
            },
            PromptPurpose::CloseNotes { project } => {
                let notes = (!content.trim().is_empty()).then_some(content);
                self.start_close(project, notes);
            }
        }
    }

    pub async fn assign_selected(&mut self, project: Option<&str>) {
        let Some(project) = project else {
            self.set_message("Error: No project selected".to_string());
            return;
        };
        let keys = self.window_list.selected_keys();

        match self.engine.assign(&keys, project).await {
            Ok(outcome) => {
                let msg = if outcome.skipped.is_empty() {
                    format!("Assigned {} window(s) to {}", outcome.assigned.len(), outcome.project)
                } else {
                    format!(
                        "Assigned {} window(s) to {} ({} no longer open)",
                        outcome.assigned.len(),
                        outcome.project,
                        outcome.skipped.len()
                    )
                };
                self.set_message(msg);
                self.window_list.clear_marks();
                self.refresh().await;
            }
            Err(e) => {
                tracing::error!("Assignment to {} failed: {}", project, e);
                self.set_message(format!("Error: {}", e));
            }
        }
    }

    fn open_close_prompt(&mut self) {
        if let Some(project) = self.closing_project().map(str::to_string) {
            self.set_message(format!("Close of {} already in progress", project));
            return;
        }
        match self.project_selector.selected() {
            Some(project) if project != UNASSIGNED => {
                let project = project.to_string();
                self.prompt.open(PromptPurpose::CloseNotes { project });
            }
            _ => self.set_message("Error: Select a project to close".to_string()),
        }
    }

    pub fn start_close(&mut self, project: String, notes: Option<String>) {
        if let Some(current) = self.closing_project().map(str::to_string) {
            self.set_message(format!("Close of {} already in progress", current));
            return;
        }

        let lifecycle = self.lifecycle.clone();
        let target = project.clone();
        let handle =
            tokio::spawn(async move { lifecycle.close_project(Some(&target), notes, true).await });

        self.set_message(format!("Closing {}...", project));
        self.close_state = CloseState::InProgress { handle, project };
    }

    pub async fn poll_close(&mut self) {
        let state = std::mem::take(&mut self.close_state);
        match state {
            CloseState::InProgress { handle, project } => {
                if !handle.is_finished() {
                    self.close_state = CloseState::InProgress { handle, project };
                    return;
                }
                match handle.await {
                    Ok(Ok(report)) => self.set_message(report.summary()),
                    Ok(Err(e)) => {
                        tracing::error!("Close of {} failed: {}", project, e);
                        self.set_message(format!("Error: {}", e));
                    }
                    Err(e) => self.set_message(format!("Error: close of {} panicked: {}", project, e)),
                }
                self.refresh().await;
            }
            CloseState::Idle => {}
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = UI::setup_terminal()?;
        self.refresh().await;

        while self.is_running() {
            terminal.draw(|frame| UI::render(frame, self))?;
            self.handle_events().await?;
            self.poll_store_events().await;
            self.poll_close().await;
        }

        UI::restore_terminal()?;
        Ok(())
    }
}
