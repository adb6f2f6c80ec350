use crate::app::{App, FeedsState, Focus};
use crate::feed::{filter_items, FeedSection};
use crate::util::{strip_control_chars, truncate_to_width};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::helpers::ERR_NO_SOURCES;
use super::render::spinner;

/// Render the feed item list for the single-feed and all-feeds views
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }
    let is_focused = app.focus == Focus::Items;
    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let filter = app.session.filter();
    let title = if filter.is_empty() {
        "Items".to_string()
    } else {
        format!("Items - filter: {}", filter)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);

    let sections = match &app.feeds_state {
        FeedsState::Loaded(sections) => sections,
        FeedsState::Idle => {
            f.render_widget(Paragraph::new("Loading feeds...").block(block), area);
            return;
        }
        FeedsState::Loading { done, total } => {
            let text = if *total > 1 {
                format!("{} Loading feeds... {}/{}", spinner(app), done, total)
            } else {
                format!("{} Loading feed...", spinner(app))
            };
            f.render_widget(Paragraph::new(text).block(block), area);
            return;
        }
    };

    if sections.is_empty() {
        f.render_widget(
            Paragraph::new(ERR_NO_SOURCES)
                .style(Style::default().fg(Color::Yellow))
                .wrap(Wrap { trim: true })
                .block(block),
            area,
        );
        return;
    }

    let max_width = area.width.saturating_sub(2) as usize;
    let mut rows: Vec<ListItem> = Vec::new();
    let mut selected_row = None;
    let mut item_index = 0;

    for section in sections {
        rows.push(section_header(section, max_width));
        for item in filter_items(section.items(), filter) {
            let selected = item_index == app.selected_item;
            if selected {
                selected_row = Some(rows.len());
            }
            item_index += 1;

            let title_style = if selected {
                Style::default()
                    .bg(Color::DarkGray)
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };

            let title = strip_control_chars(&item.title).into_owned();
            let description = item.plain_description();
            let mut lines = vec![
                Line::from(Span::styled(
                    truncate_to_width(&title, max_width).into_owned(),
                    title_style,
                )),
                Line::from(Span::styled(
                    truncate_to_width(&description, max_width).into_owned(),
                    Style::default().fg(Color::Gray),
                )),
            ];
            if let Some(image) = &item.image_url {
                lines.push(Line::from(Span::styled(
                    truncate_to_width(&format!("[Image: {}]", image), max_width).into_owned(),
                    Style::default().fg(Color::Blue),
                )));
            }
            lines.push(Line::from(""));
            rows.push(ListItem::new(Text::from(lines)));
        }
    }

    if item_index == 0 && !filter.is_empty() {
        rows.push(ListItem::new(Span::styled(
            format!("No items match \"{}\"", filter),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let list = List::new(rows).block(block);
    let mut state = ListState::default().with_selected(selected_row);
    f.render_stateful_widget(list, area, &mut state);
}

/// The section's URL, plus the error when the fetch failed.
fn section_header(section: &FeedSection, max_width: usize) -> ListItem<'static> {
    let mut lines = vec![Line::from(Span::styled(
        truncate_to_width(&section.url, max_width).into_owned(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::UNDERLINED),
    ))];
    if let Err(e) = &section.result {
        lines.push(Line::from(vec![
            Span::styled("⚠ ", Style::default().fg(Color::Red)),
            Span::styled(
                truncate_to_width(&format!("Failed to load: {}", e), max_width).into_owned(),
                Style::default().fg(Color::Red),
            ),
        ]));
    }
    lines.push(Line::from(""));
    ListItem::new(Text::from(lines))
}
