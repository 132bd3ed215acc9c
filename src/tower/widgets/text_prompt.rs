use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPurpose {
    NewProject,
    CloseNotes { project: String },
}

/// Single-purpose modal text input for project names and closing notes.
pub struct TextPrompt {
    content: String,
    /// Cursor position in chars, not bytes.
    cursor: usize,
    purpose: Option<PromptPurpose>,
}

impl TextPrompt {
    pub fn new() -> Self {
        Self {
            content: String::new(),
            cursor: 0,
            purpose: None,
        }
    }

    pub fn open(&mut self, purpose: PromptPurpose) {
        self.clear();
        self.purpose = Some(purpose);
    }

    /// Hides the prompt and hands back what was typed.
    pub fn close(&mut self) -> Option<(PromptPurpose, String)> {
        let purpose = self.purpose.take()?;
        let content = std::mem::take(&mut self.content);
        self.cursor = 0;
        Some((purpose, content))
    }

    pub fn is_visible(&self) -> bool {
        self.purpose.is_some()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    pub fn insert_newline(&mut self) {
        if matches!(self.purpose, Some(PromptPurpose::CloseNotes { .. })) {
            self.insert_char('\n');
        }
    }

    pub fn delete_char(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.content.remove(at);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.char_len() {
            self.cursor += 1;
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let Some(purpose) = &self.purpose else {
            return;
        };

        let (title, hint) = match purpose {
            PromptPurpose::NewProject => (
                " New project ".to_string(),
                "Enter: create and assign  Esc: cancel",
            ),
            PromptPurpose::CloseNotes { project } => (
                format!(" Close {} - closing notes ", project),
                "Enter: close project  Alt+Enter: newline  Esc: cancel",
            ),
        };

        frame.render_widget(Clear, area);

        let split = self.byte_index(self.cursor);
        let (before, after) = self.content.split_at(split);
        let text_style = Style::default().fg(Color::White);

        let mut lines: Vec<Line> = Vec::new();
        let before_lines: Vec<&str> = before.split('\n').collect();
        let after_lines: Vec<&str> = after.split('\n').collect();
        for line in &before_lines[..before_lines.len() - 1] {
            lines.push(Line::from(Span::styled(*line, text_style)));
        }
        lines.push(Line::from(vec![
            Span::styled(before_lines[before_lines.len() - 1], text_style),
            Span::styled(
                "│",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled(after_lines[0], text_style),
        ]));
        for line in &after_lines[1..] {
            lines.push(Line::from(Span::styled(*line, text_style)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::DarkGray),
        )));

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(title),
            )
            .wrap(Wrap { trim: false });

        frame.render_widget(paragraph, area);
    }
}

impl Default for TextPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes_prompt() -> TextPrompt {
        let mut prompt = TextPrompt::new();
        prompt.open(PromptPurpose::CloseNotes {
            project: "Proj1".to_string(),
        });
        prompt
    }

    #[test]
    fn text_prompt_starts_hidden() {
        let prompt = TextPrompt::new();
        assert!(!prompt.is_visible());
    }

    #[test]
    fn text_prompt_insert_and_delete() {
        let mut prompt = notes_prompt();
        for c in "abc".chars() {
            prompt.insert_char(c);
        }
        prompt.move_cursor_left();
        prompt.delete_char();
        assert_eq!(prompt.content(), "ac");
    }

    #[test]
    fn text_prompt_handles_multibyte_characters() {
        let mut prompt = notes_prompt();
        for c in "日本".chars() {
            prompt.insert_char(c);
        }
        prompt.move_cursor_left();
        prompt.insert_char('x');
        assert_eq!(prompt.content(), "日x本");
        prompt.move_cursor_right();
        prompt.move_cursor_right();
        prompt.delete_char();
        assert_eq!(prompt.content(), "日x");
    }

    #[test]
    fn text_prompt_newline_only_for_notes() {
        let mut notes = notes_prompt();
        notes.insert_newline();
        assert_eq!(notes.content(), "\n");

        let mut name = TextPrompt::new();
        name.open(PromptPurpose::NewProject);
        name.insert_newline();
        assert_eq!(name.content(), "");
    }

    #[test]
    fn text_prompt_close_returns_purpose_and_content() {
        let mut prompt = notes_prompt();
        prompt.insert_char('x');

        let (purpose, content) = prompt.close().unwrap();

        assert_eq!(
            purpose,
            PromptPurpose::CloseNotes {
                project: "Proj1".to_string()
            }
        );
        assert_eq!(content, "x");
        assert!(!prompt.is_visible());
        assert!(prompt.close().is_none());
    }

    #[test]
    fn text_prompt_open_clears_previous_content() {
        let mut prompt = notes_prompt();
        prompt.insert_char('x');
        prompt.open(PromptPurpose::NewProject);
        assert_eq!(prompt.content(), "");
    }
}
