use std::collections::BTreeSet;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use crate::models::WindowKey;
use crate::utils::fit_width;

const TITLE_WIDTH: usize = 48;
const PROJECT_WIDTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
    pub key: WindowKey,
    pub title: String,
    pub project: Option<String>,
    pub process: Option<String>,
    pub detail: Option<String>,
}

impl WindowEntry {
    pub fn is_pending(&self) -> bool {
        self.project.is_none()
    }
}

pub struct WindowList {
    entries: Vec<WindowEntry>,
    marked: BTreeSet<WindowKey>,
    state: ListState,
}

impl WindowList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            marked: BTreeSet::new(),
            state: ListState::default(),
        }
    }

    /// Replaces the entries, keeping the cursor on the same window if it is
    /// still present. Marks on vanished windows are dropped.
    pub fn set_entries(&mut self, entries: Vec<WindowEntry>) {
        let selected_key = self.selected().map(|e| e.key.clone());
        self.entries = entries;
        self.marked
            .retain(|key| self.entries.iter().any(|e| &e.key == key));

        let index = selected_key
            .and_then(|key| self.entries.iter().position(|e| e.key == key))
            .or_else(|| {
                let previous = self.state.selected()?;
                (!self.entries.is_empty()).then(|| previous.min(self.entries.len() - 1))
            })
            .or_else(|| (!self.entries.is_empty()).then_some(0));
        self.state.select(index);
    }

    pub fn entries(&self) -> &[WindowEntry] {
        &self.entries
    }

    pub fn next(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.entries.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn prev(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.entries.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn selected(&self) -> Option<&WindowEntry> {
        self.state.selected().and_then(|i| self.entries.get(i))
    }

    pub fn toggle_mark(&mut self) {
        let Some(key) = self.selected().map(|e| e.key.clone()) else {
            return;
        };
        if !self.marked.remove(&key) {
            self.marked.insert(key);
        }
    }

    pub fn clear_marks(&mut self) {
        self.marked.clear();
    }

    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    /// Marked windows, or the one under the cursor when nothing is marked.
    pub fn selected_keys(&self) -> Vec<WindowKey> {
        if !self.marked.is_empty() {
            return self.marked.iter().cloned().collect();
        }
        self.selected().map(|e| vec![e.key.clone()]).unwrap_or_default()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .entries
            .iter()
            .map(|entry| {
                let mark = if self.marked.contains(&entry.key) {
                    Span::styled("* ", Style::default().fg(Color::Magenta))
                } else {
                    Span::raw("  ")
                };
                let (project, project_style) = match &entry.project {
                    Some(p) => (p.as_str(), Style::default().fg(Color::Cyan)),
                    None => ("pending", Style::default().fg(Color::Yellow)),
                };

                let mut spans = vec![
                    mark,
                    Span::styled(
                        fit_width(&entry.title, TITLE_WIDTH),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" "),
                    Span::styled(fit_width(project, PROJECT_WIDTH), project_style),
                    Span::raw(" "),
                    Span::styled(
                        entry.process.clone().unwrap_or_default(),
                        Style::default().fg(Color::DarkGray),
                    ),
                ];
                if let Some(detail) = &entry.detail {
                    spans.push(Span::raw(" "));
                    spans.push(Span::styled(
                        detail.clone(),
                        Style::default().fg(Color::DarkGray),
                    ));
                }

                ListItem::new(Line::from(spans))
            })
            .collect();

        let title = format!(
            "Windows ({} live, {} pending, {} marked)",
            self.entries.len(),
            self.pending_count(),
            self.marked.len()
        );

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(title),
            )
            .highlight_style(
                Style::default()
                    .add_modifier(Modifier::REVERSED)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");

        frame.render_stateful_widget(list, area, &mut self.state);
    }
}

impl Default for WindowList {
    fn default() -> Self {
        Self::new()
    }
}
