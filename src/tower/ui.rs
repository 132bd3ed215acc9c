use std::io::{self, Stdout};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};

use super::app::TowerApp;

pub struct UI;

impl UI {
    pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend)
    }

    pub fn restore_terminal() -> io::Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        Ok(())
    }

    pub fn render(frame: &mut Frame, app: &mut TowerApp) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(frame.area());

        Self::render_header(frame, chunks[0], app);
        app.window_list().render(frame, chunks[1]);
        app.project_selector().render(frame, chunks[2]);
        Self::render_footer(frame, chunks[3], app);

        if app.prompt().is_visible() {
            let modal_area = Self::centered_area(frame.area(), 60, 40);
            app.prompt().render(frame, modal_area);
        }

        if app.help_modal().is_visible() {
            let modal_area = Self::centered_area(frame.area(), 70, 80);
            app.help_modal().render(frame, modal_area);
        }
    }

    fn centered_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(area);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }

    fn render_header(frame: &mut Frame, area: Rect, app: &mut TowerApp) {
        let total = app.window_list().entries().len();
        let pending = app.window_list().pending_count();
        let marked = app.window_list().marked_count();
        let projects = app.project_selector().projects().len().saturating_sub(1);

        let mut title = vec![Span::styled(
            " WINTRACK ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )];

        // Show subtitle only when width is sufficient
        if area.width >= 100 {
            title.push(Span::raw(" - Window to Project Tracker "));
        }
        title.push(Span::raw("| "));

        title.extend([
            Span::styled(
                format!("Windows: {} ", total),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                format!("Pending: {} ", pending),
                Style::default().fg(if pending > 0 {
                    Color::Yellow
                } else {
                    Color::Gray
                }),
            ),
            Span::styled(
                format!("Marked: {} ", marked),
                Style::default().fg(Color::Magenta),
            ),
            Span::raw("| "),
            Span::styled(
                format!("Projects: {}", projects),
                Style::default().fg(Color::Cyan),
            ),
        ]);

        if let Some(project) = app.closing_project() {
            title.push(Span::styled(
                format!(" | Closing {}", project),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }

        let header = Paragraph::new(Line::from(title)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );

        frame.render_widget(header, area);
    }

    fn render_footer(frame: &mut Frame, area: Rect, app: &mut TowerApp) {
        let message = app.message().unwrap_or("");
        let message = if message.is_empty() {
            String::new()
        } else {
            format!("{} | ", message)
        };
        let message_style = if message.contains("Error") {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::Green)
        };

        let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
        let help_text = vec![
            Span::styled(message, message_style),
            key("Space"),
            Span::raw(": Mark "),
            key("Enter"),
            Span::raw(": Assign "),
            key("n"),
            Span::raw(": New "),
            key("c"),
            Span::raw(": Close "),
            key("?"),
            Span::raw(": Help "),
            key("q"),
            Span::raw(": Quit"),
        ];

        let footer = Paragraph::new(Line::from(help_text)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );

        frame.render_widget(footer, area);
    }
}
