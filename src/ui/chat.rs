use crate::app::App;
use crate::session::Role;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::reader::render_markdown;
use super::render::spinner;

/// Render the chat panel: transcript on top, input line below.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 6 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let mut lines: Vec<Line<'static>> = Vec::new();
    if app.session.chat.is_empty() {
        lines.push(Line::from(Span::styled(
            "Ask the model anything. Each message is answered on its own.",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for message in app.session.chat.messages() {
        match message.role {
            Role::User => {
                lines.push(Line::from(Span::styled(
                    "You",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )));
                lines.extend(message.text.lines().map(|l| Line::from(l.to_string())));
            }
            Role::Bot => {
                lines.push(Line::from(Span::styled(
                    "Bot",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                )));
                lines.extend(render_markdown(&message.text));
            }
        }
        lines.push(Line::from(""));
    }
    if app.session.chat.awaiting_reply() {
        lines.push(Line::from(Span::styled(
            format!("{} Thinking...", spinner(app)),
            Style::default().fg(Color::DarkGray),
        )));
    }

    // Keep the newest messages in view
    let inner_height = chunks[0].height.saturating_sub(2) as usize;
    let inner_width = chunks[0].width.saturating_sub(2) as usize;
    let total = App::wrapped_lines(&lines, inner_width);
    let scroll = total.saturating_sub(inner_height).min(crate::app::MAX_SCROLL) as u16;

    let transcript = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Chat"))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(transcript, chunks[0]);

    let input = Paragraph::new(format!("> {}_", app.chat_input)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title("Message"),
    );
    f.render_widget(input, chunks[1]);
}
