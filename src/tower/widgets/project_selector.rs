use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::models::UNASSIGNED;

/// Horizontal project picker. The Unassigned bucket is always the first entry.
pub struct ProjectSelector {
    projects: Vec<String>,
    selected: usize,
    closing: Vec<String>,
}

impl ProjectSelector {
    pub fn new() -> Self {
        Self {
            projects: vec![UNASSIGNED.to_string()],
            selected: 0,
            closing: Vec::new(),
        }
    }

    pub fn set_projects(&mut self, projects: Vec<String>) {
        let current = self.selected().map(str::to_string);
        self.projects = std::iter::once(UNASSIGNED.to_string())
            .chain(projects.into_iter().filter(|p| p != UNASSIGNED))
            .collect();
        self.selected = current
            .and_then(|name| self.projects.iter().position(|p| *p == name))
            .unwrap_or(0);
    }

    pub fn set_closing(&mut self, closing: Vec<String>) {
        self.closing = closing;
    }

    /// Adds a project that has no windows yet and selects it.
    pub fn add_and_select(&mut self, project: &str) {
        match self.projects.iter().position(|p| p == project) {
            Some(i) => self.selected = i,
            None => {
                self.projects.push(project.to_string());
                self.selected = self.projects.len() - 1;
            }
        }
    }

    pub fn next(&mut self) {
        self.selected = (self.selected + 1) % self.projects.len();
    }

    pub fn prev(&mut self) {
        self.selected = self
            .selected
            .checked_sub(1)
            .unwrap_or(self.projects.len() - 1);
    }

    pub fn selected(&self) -> Option<&str> {
        self.projects.get(self.selected).map(String::as_str)
    }

    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let mut spans = Vec::new();
        for (i, project) in self.projects.iter().enumerate() {
            let mut style = if project == UNASSIGNED {
                Style::default().fg(Color::Gray)
            } else {
                Style::default().fg(Color::Cyan)
            };
            if self.closing.contains(project) {
                style = style.fg(Color::Red).add_modifier(Modifier::DIM);
            }
            if i == self.selected {
                style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
            }
            spans.push(Span::styled(format!(" {} ", project), style));
            spans.push(Span::raw(" "));
        }

        let paragraph = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title("Project (Tab / Shift+Tab)"),
        );
        frame.render_widget(paragraph, area);
    }
}

impl Default for ProjectSelector {
    fn default() -> Self {
        Self::new()
    }
}
