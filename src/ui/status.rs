use crate::app::{App, Focus, InputMode};
use crate::view::View;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: &str = match &app.status_message {
        Some((msg, _)) => msg,
        None => hints(app),
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(text).style(style), area);
}

/// Key hints for whatever currently receives input.
fn hints(app: &App) -> &'static str {
    match &app.mode {
        InputMode::Search { .. } => return "Type to filter | ENTER apply | ESC cancel",
        InputMode::EditUrl { .. } => return "Type the feed URL | ENTER save | ESC cancel",
        InputMode::Normal => {}
    }
    if app.chat_open {
        return "Type a message | ENTER send | ESC close";
    }
    match (app.view(), app.focus) {
        (View::ArticleDetail(_), _) => {
            "[b]ack [j/k]scroll [Ctrl+d/u]page [1]summary [2]sentiment [3]keywords [o]pen [q]uit"
        }
        (_, Focus::Sidebar) => {
            "[Enter]show [a]ll feeds [+]add [e]dit [-]remove [/]filter [c]hat [Tab]switch [q]uit"
        }
        (_, Focus::Items) => "[Enter]read more [o]pen [/]filter [a]ll feeds [c]hat [Tab]switch [q]uit",
    }
}
