//! Render functions for the TUI.
//!
//! The screen is a feed sidebar on the left and a main panel on the right,
//! with a status bar below. The main panel shows chat while it is open and
//! otherwise follows the current [`View`].

use crate::app::{App, InputMode};
use crate::view::View;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::loop_runner::SPINNER_FRAMES;
use super::{articles, chat, feeds, reader, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

const IDLE_PLACEHOLDER: &str =
    "Choose a feed from the sidebar or press 'a' to get all feeds.";

const SPINNER: [char; SPINNER_FRAMES] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Current frame of the loading spinner.
pub(super) fn spinner(app: &App) -> char {
    SPINNER[app.spinner_frame % SPINNER_FRAMES]
}

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let input_height = if app.mode == InputMode::Normal { 0 } else { 3 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(input_height),
            Constraint::Length(1),
        ])
        .split(area);

    render_main_panels(f, app, chunks[0]);
    if input_height > 0 {
        render_input_line(f, app, chunks[1]);
    }
    status::render(f, app, chunks[2]);
}

/// Sidebar (30%) and main panel (70%).
fn render_main_panels(f: &mut Frame, app: &mut App, area: Rect) {
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    feeds::render(f, app, main_chunks[0]);

    if app.chat_open {
        chat::render(f, app, main_chunks[1]);
        return;
    }
    match app.view() {
        View::Idle => render_placeholder(f, main_chunks[1]),
        View::SingleFeed(_) | View::AllFeeds => articles::render(f, app, main_chunks[1]),
        View::ArticleDetail(_) => reader::render(f, app, main_chunks[1]),
    }
}

fn render_placeholder(f: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(IDLE_PLACEHOLDER)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("newsrss"));
    f.render_widget(paragraph, area);
}

/// The text field for the search filter or the feed URL being edited.
fn render_input_line(f: &mut Frame, app: &App, area: Rect) {
    let (title, text) = match &app.mode {
        InputMode::Search { buffer } => ("Filter", buffer.as_str()),
        InputMode::EditUrl { index, buffer } => {
            let paragraph = Paragraph::new(format!("> {}_", buffer)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(format!("Feed URL #{}", index + 1)),
            );
            f.render_widget(paragraph, area);
            return;
        }
        InputMode::Normal => return,
    };
    let paragraph = Paragraph::new(format!("> {}_", text)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(title),
    );
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LlmProvider};
    use crate::session::FeedSources;
    use crate::view::ViewAction;
    use ratatui::{backend::TestBackend, Terminal};

    fn test_app() -> App {
        let mut config = Config::default();
        config.llm.provider = LlmProvider::Stub;
        App::new(&config, FeedSources::new(Vec::new())).unwrap()
    }

    fn screen_text(app: &mut App) -> String {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_idle_shows_placeholder() {
        let mut app = test_app();
        let screen = screen_text(&mut app);
        assert!(screen.contains("Choose a feed from the sidebar"));
    }

    #[test]
    fn test_all_feeds_without_sources_shows_prompt() {
        let mut app = test_app();
        app.session.dispatch(ViewAction::ShowAllFeeds);
        app.feeds_state = crate::app::FeedsState::Loaded(Vec::new());
        let screen = screen_text(&mut app);
        assert!(screen.contains("Please enter at least one RSS Feed URL."));
    }

    #[test]
    fn test_small_terminal_message() {
        let mut app = test_app();
        let backend = TestBackend::new(30, 8);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Terminal too small"));
    }
}
