use crate::app::{AnalysisState, App, ContentState};
use crate::content::Article;
use crate::llm::Analysis;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};
use std::borrow::Cow;

/// Render the article reader view
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    // Layout may produce zero-sized rects during extreme terminal resizes
    if area.width < 3 || area.height < 3 {
        return;
    }

    app.reader_visible_lines = area.height.saturating_sub(2) as usize;
    app.reader_viewport_width = area.width.saturating_sub(2) as usize;

    let body: Cow<'_, [Line<'static>]> = match &app.content_state {
        ContentState::Idle => Cow::Owned(vec![Line::from("No article selected")]),
        ContentState::Loading { url } => Cow::Owned(vec![
            Line::from("Loading article..."),
            Line::from(Span::styled(url.clone(), Style::default().fg(Color::DarkGray))),
        ]),
        ContentState::Loaded { rendered_lines, .. } => Cow::Borrowed(rendered_lines),
        ContentState::Failed { url, error } => Cow::Owned(vec![
            Line::from(Span::styled(
                format!("Failed to load article: {}", error),
                Style::default().fg(Color::Red),
            )),
            Line::from(""),
            Line::from(Span::styled(url.clone(), Style::default().fg(Color::DarkGray))),
            Line::from("Press [o] to open it in the browser."),
        ]),
    };

    let mut lines: Vec<Line<'static>> = body.iter().cloned().collect();
    lines.extend(analysis_lines(app));

    // Clamp before drawing so a resize never renders past the end.
    let content_lines = app.reader_content_lines(&lines);
    app.clamp_scroll(content_lines, app.reader_visible_lines);

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("Article"))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll_offset.min(crate::app::MAX_SCROLL) as u16, 0));

    f.render_widget(paragraph, area);
}

/// Lines for the analysis blocks requested so far, in a fixed order.
fn analysis_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for analysis in Analysis::ALL {
        let Some(state) = app.analyses.get(&analysis) else {
            continue;
        };
        lines.push(Line::from(Span::styled(
            analysis.label(),
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::Magenta),
        )));
        match state {
            AnalysisState::Pending => lines.push(Line::from(Span::styled(
                "Thinking...",
                Style::default().fg(Color::DarkGray),
            ))),
            AnalysisState::Done(reply) => lines.extend(reply.iter().cloned()),
        }
        lines.push(Line::from(""));
    }
    lines
}

/// Styled lines for an extracted article: title, byline, image and body.
pub fn render_article(article: &Article) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(article.text.lines().count() + 6);

    let title = if article.title.is_empty() {
        article.url.as_str()
    } else {
        article.title.as_str()
    };
    lines.push(Line::from(Span::styled(
        title.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    )));

    let mut byline = Vec::new();
    if !article.authors.is_empty() {
        byline.push(format!("By {}", article.authors.join(", ")));
    }
    if let Some(date) = article.publish_date {
        byline.push(date.format("%B %-d, %Y").to_string());
    }
    if !byline.is_empty() {
        lines.push(Line::from(Span::styled(
            byline.join(" • "),
            Style::default().fg(Color::DarkGray),
        )));
    }

    if let Some(image) = &article.top_image {
        lines.push(Line::from(Span::styled(
            format!("[Image: {}]", image),
            Style::default().fg(Color::Blue),
        )));
    }
    lines.push(Line::from(""));

    if article.text.is_empty() {
        lines.push(Line::from(Span::styled(
            "No article text could be extracted.",
            Style::default().fg(Color::Yellow),
        )));
    } else {
        for paragraph in article.text.split("\n\n") {
            lines.push(Line::from(paragraph.to_string()));
            lines.push(Line::from(""));
        }
    }

    lines.push(Line::from(Span::styled(
        "[1] summary  [2] sentiment  [3] keywords",
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(""));
    lines
}

/// Convert markdown to styled ratatui Lines.
/// Returns owned Lines so model replies can be kept between frames.
pub fn render_markdown(md: &str) -> Vec<Line<'static>> {
    let parser = Parser::new(md);
    let mut lines: Vec<Line<'static>> = Vec::with_capacity(md.lines().count());
    let mut current_spans: Vec<Span<'static>> = Vec::with_capacity(4);
    let mut in_code_block = false;
    let mut in_heading = false;
    let mut in_emphasis = false;
    let mut in_strong = false;
    let mut list_depth = 0usize;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                in_heading = true;
            }
            Event::End(TagEnd::Heading(_)) => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
                in_heading = false;
            }
            Event::Start(Tag::Paragraph) => {}
            Event::End(TagEnd::Paragraph) => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
                if list_depth == 0 {
                    lines.push(Line::from(""));
                }
            }
            Event::Start(Tag::List(_)) => {
                list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                if list_depth == 0 {
                    lines.push(Line::from(""));
                }
            }
            Event::Start(Tag::Item) => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
                current_spans.push(Span::raw(format!(
                    "{}• ",
                    "  ".repeat(list_depth.saturating_sub(1))
                )));
            }
            Event::End(TagEnd::Item) => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
            }
            Event::Start(Tag::CodeBlock(_)) => {
                in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                lines.push(Line::from(""));
            }
            Event::Start(Tag::Emphasis) => {
                in_emphasis = true;
            }
            Event::End(TagEnd::Emphasis) => {
                in_emphasis = false;
            }
            Event::Start(Tag::Strong) => {
                in_strong = true;
            }
            Event::End(TagEnd::Strong) => {
                in_strong = false;
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                current_spans.push(Span::styled(
                    format!("[Image: {}]", dest_url),
                    Style::default().fg(Color::Blue),
                ));
            }
            Event::Text(text) => {
                let style = if in_code_block {
                    Style::default().fg(Color::Yellow).bg(Color::Black)
                } else if in_heading {
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .fg(Color::Cyan)
                } else if in_strong {
                    Style::default().add_modifier(Modifier::BOLD)
                } else if in_emphasis {
                    Style::default().add_modifier(Modifier::ITALIC)
                } else {
                    Style::default()
                };
                if in_code_block {
                    for code_line in text.lines() {
                        lines.push(Line::from(Span::styled(code_line.to_string(), style)));
                    }
                } else {
                    current_spans.push(Span::styled(text.into_string(), style));
                }
            }
            Event::Code(code) => {
                current_spans.push(Span::styled(
                    format!("`{}`", code),
                    Style::default().fg(Color::Yellow),
                ));
            }
            Event::SoftBreak => {
                current_spans.push(Span::raw(" "));
            }
            Event::HardBreak => {
                if !current_spans.is_empty() {
                    lines.push(Line::from(std::mem::take(&mut current_spans)));
                }
            }
            _ => {}
        }
    }

    if !current_spans.is_empty() {
        lines.push(Line::from(current_spans));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn all_text(lines: &[Line<'_>]) -> Vec<String> {
        lines.iter().map(line_text).collect()
    }

    fn article() -> Article {
        Article {
            url: "https://news.example/story".into(),
            title: "Big Story".into(),
            text: "First paragraph.\n\nSecond paragraph.".into(),
            authors: vec!["Ada Lovelace".into(), "Alan Turing".into()],
            publish_date: Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()),
            top_image: Some("https://news.example/lead.jpg".into()),
        }
    }

    #[test]
    fn test_render_article_header_and_body() {
        let text = all_text(&render_article(&article()));
        assert_eq!(text[0], "Big Story");
        assert_eq!(text[1], "By Ada Lovelace, Alan Turing • March 5, 2024");
        assert_eq!(text[2], "[Image: https://news.example/lead.jpg]");
        assert!(text.contains(&"First paragraph.".to_string()));
        assert!(text.contains(&"Second paragraph.".to_string()));
    }

    #[test]
    fn test_render_article_without_metadata() {
        let bare = Article {
            title: String::new(),
            text: String::new(),
            authors: Vec::new(),
            publish_date: None,
            top_image: None,
            ..article()
        };
        let text = all_text(&render_article(&bare));
        assert_eq!(text[0], "https://news.example/story");
        assert_eq!(text[1], "");
        assert!(text.contains(&"No article text could be extracted.".to_string()));
    }

    #[test]
    fn test_render_plain_text() {
        let lines = render_markdown("Hello world");
        assert_eq!(line_text(&lines[0]), "Hello world");
    }

    #[test]
    fn test_render_heading_is_bold() {
        let lines = render_markdown("# Heading 1\n\n## Heading 2");
        assert_eq!(line_text(&lines[0]), "Heading 1");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_render_bold() {
        let lines = render_markdown("This is **bold** text");
        assert_eq!(line_text(&lines[0]), "This is bold text");
    }

    #[test]
    fn test_render_list_items_get_bullets() {
        let lines = render_markdown("Keywords:\n\n- rust\n- tokio\n");
        let text = all_text(&lines);
        assert!(text.contains(&"• rust".to_string()));
        assert!(text.contains(&"• tokio".to_string()));
    }

    #[test]
    fn test_render_code_block_keeps_lines() {
        let lines = render_markdown("```\nlet a = 1;\nlet b = 2;\n```");
        let text = all_text(&lines);
        assert_eq!(text[0], "let a = 1;");
        assert_eq!(text[1], "let b = 2;");
    }

    #[test]
    fn test_render_empty() {
        assert!(render_markdown("").is_empty());
    }

    #[test]
    fn test_render_unicode() {
        let lines = render_markdown("Hello 世界 🌍");
        assert!(!lines.is_empty());
    }
}
