use crate::app::{App, Focus, InputMode};
use crate::util::truncate_to_width;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

/// Render the feed URL sidebar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let is_focused = app.focus == Focus::Sidebar && !app.chat_open;
    let active = app.session.view().active_feed();
    let max_width = area.width.saturating_sub(4) as usize;

    let items: Vec<ListItem> = app
        .session
        .sources
        .iter()
        .enumerate()
        .map(|(i, url)| {
            let editing = matches!(&app.mode, InputMode::EditUrl { index, .. } if *index == i);
            let label = if url.trim().is_empty() {
                Span::styled("(empty)", Style::default().fg(Color::DarkGray))
            } else {
                Span::raw(truncate_to_width(url, max_width).into_owned())
            };

            let style = if i == app.selected_source {
                Style::default().bg(Color::DarkGray).fg(Color::White)
            } else if active == Some(url.trim()) {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let marker = if editing { "✎ " } else { "  " };
            ListItem::new(Line::from(vec![Span::raw(marker), label])).style(style)
        })
        .collect();

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let title = if app.session.view().is_all_feeds() {
        format!("Feeds ({}) - all", app.session.sources.len())
    } else {
        format!("Feeds ({})", app.session.sources.len())
    };
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(title),
    );

    let mut state = ListState::default().with_selected(Some(app.selected_source));
    f.render_stateful_widget(list, area, &mut state);
}
