use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

pub struct HelpModal {
    visible: bool,
}

impl HelpModal {
    pub fn new() -> Self {
        Self { visible: false }
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        if !self.visible {
            return;
        }

        frame.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(Span::styled(
                " Help ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));

        let paragraph = Paragraph::new(self.build_help_lines()).block(block);
        frame.render_widget(paragraph, area);
    }

    fn build_help_lines(&self) -> Vec<Line<'static>> {
        vec![
            Self::section_title("Keyboard Shortcuts"),
            Line::from(""),
            Self::subsection_title("Windows"),
            Self::key_line("j / \u{2193}", "Next window"),
            Self::key_line("k / \u{2191}", "Previous window"),
            Self::key_line("Space", "Mark / unmark window"),
            Self::key_line("Esc", "Clear marks"),
            Line::from(""),
            Self::subsection_title("Projects"),
            Self::key_line("Tab / Shift+Tab", "Next / previous project"),
            Self::key_line("Enter / a", "Assign marked (or current) window to project"),
            Self::key_line("u", "Move to Unassigned"),
            Self::key_line("n", "Create project and assign"),
            Self::key_line("c", "Close selected project (asks for notes)"),
            Line::from(""),
            Self::subsection_title("Global"),
            Self::key_line("?", "Toggle this help"),
            Self::key_line("q / Ctrl+C", "Quit"),
            Line::from(""),
            Line::from(vec![
                Span::styled("Enter / Esc / ?", Style::default().fg(Color::Yellow)),
                Span::raw(": Close this help"),
            ]),
        ]
    }

    fn section_title(title: &'static str) -> Line<'static> {
        Line::from(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
    }

    fn subsection_title(title: &'static str) -> Line<'static> {
        Line::from(Span::styled(
            format!("━━━ {} ━━━", title),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
    }

    fn key_line(key: &'static str, description: &'static str) -> Line<'static> {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{:18}", key), Style::default().fg(Color::Yellow)),
            Span::raw(description),
        ])
    }
}

impl Default for HelpModal {
    fn default() -> Self {
        Self::new()
    }
}
