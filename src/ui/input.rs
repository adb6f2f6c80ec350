//! Input handling for the TUI.
//!
//! Keys go to the first handler that owns them: an open text field (URL
//! editor, search), then the chat panel, then the reader, then the browse
//! panels.

use crate::app::{App, AppEvent, FeedsState, Focus, InputMode};
use crate::llm::Analysis;
use crate::util::MAX_SEARCH_QUERY_LENGTH;
use crate::view::{View, ViewAction};
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::{
    open_article, open_in_browser, send_chat, spawn_analysis, spawn_feed_load, ERR_ITEM_NO_LINK,
    ERR_NO_SOURCES,
};
use super::Action;

/// Held keys cannot grow a text field past this.
const MAX_URL_INPUT_LENGTH: usize = 2048;
const MAX_CHAT_INPUT_LENGTH: usize = 4096;

/// Lines moved by Ctrl+d / Ctrl+u in the reader.
const PAGE_LINES: usize = 20;

/// Main input dispatch function.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match app.mode {
        InputMode::EditUrl { .. } => {
            handle_edit_url_input(app, code);
            return Action::Continue;
        }
        InputMode::Search { .. } => {
            handle_search_input(app, code);
            return Action::Continue;
        }
        InputMode::Normal => {}
    }

    if app.chat_open {
        handle_chat_input(app, code, event_tx);
        return Action::Continue;
    }

    match app.view() {
        View::ArticleDetail(_) => handle_reader_input(app, code, modifiers, event_tx),
        _ => handle_browse_input(app, code, event_tx),
    }
}

/// Handle input in the sidebar and item list.
fn handle_browse_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> Action {
    // With no item list on screen only the sidebar takes keys
    let list_shown = app.view() != View::Idle;
    if !list_shown {
        app.focus = Focus::Sidebar;
    }

    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('j') | KeyCode::Down => app.nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.nav_up(),
        KeyCode::Tab if list_shown => {
            app.focus = match app.focus {
                Focus::Sidebar => Focus::Items,
                Focus::Items => Focus::Sidebar,
            };
        }
        KeyCode::Char('/') => {
            app.mode = InputMode::Search {
                buffer: app.session.search_term.clone(),
            };
        }
        KeyCode::Char('a') => show_all_feeds(app, event_tx),
        KeyCode::Char('c') => open_chat(app),
        _ => match app.focus {
            Focus::Sidebar => handle_sidebar_key(app, code, event_tx),
            Focus::Items => handle_items_key(app, code, event_tx),
        },
    }
    Action::Continue
}

fn handle_sidebar_key(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    match code {
        KeyCode::Enter => show_selected_feed(app, event_tx),
        KeyCode::Char('+') => {
            let index = app.session.sources.add();
            app.selected_source = index;
            app.mode = InputMode::EditUrl {
                index,
                buffer: String::new(),
            };
        }
        KeyCode::Char('e') => {
            let index = app.selected_source;
            let buffer = app.selected_source_url().unwrap_or_default().to_string();
            app.mode = InputMode::EditUrl { index, buffer };
        }
        KeyCode::Char('-') => {
            if let Err(e) = app.session.sources.remove_last() {
                app.set_status(e.to_string());
            }
            app.clamp_selections();
        }
        _ => {}
    }
}

fn handle_items_key(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    match code {
        KeyCode::Enter => {
            let Some(url) = app
                .selected_item()
                .map(|item| item.article_url().map(str::to_string))
            else {
                return;
            };
            let Some(url) = url else {
                app.set_status(ERR_ITEM_NO_LINK);
                return;
            };
            app.session.dispatch(ViewAction::OpenArticle(url.clone()));
            open_article(app, url, event_tx);
        }
        KeyCode::Char('o') => {
            let Some(url) = app
                .selected_item()
                .and_then(|item| item.article_url().map(str::to_string))
            else {
                app.set_status(ERR_ITEM_NO_LINK);
                return;
            };
            open_in_browser(app, &url);
        }
        _ => {}
    }
}

/// Shows the feed under the sidebar cursor in the item list.
fn show_selected_feed(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let url = app.selected_source_url().unwrap_or_default().trim().to_string();
    if url.is_empty() {
        app.set_status(ERR_NO_SOURCES);
        return;
    }
    app.session.dispatch(ViewAction::SelectFeed(url.clone()));
    app.focus = Focus::Items;
    spawn_feed_load(app, vec![url], event_tx);
}

/// Shows every non-blank feed URL in list order.
fn show_all_feeds(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    app.session.dispatch(ViewAction::ShowAllFeeds);
    app.focus = Focus::Items;

    let urls = app.session.sources.active_urls();
    if urls.is_empty() {
        // Nothing to fetch; a load still running must not land here
        if let Some(handle) = app.feed_load_handle.take() {
            handle.abort();
        }
        app.feed_generation = app.feed_generation.wrapping_add(1);
        app.feeds_state = FeedsState::Loaded(Vec::new());
        app.selected_item = 0;
        app.set_status(ERR_NO_SOURCES);
        return;
    }
    spawn_feed_load(app, urls, event_tx);
}

fn open_chat(app: &mut App) {
    if app.reader_url().is_some() {
        app.exit_reader();
    }
    app.session.dispatch(ViewAction::OpenChat);
    app.chat_open = true;
}

/// Handle input in the article reader.
fn handle_reader_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('b') | KeyCode::Esc => {
            app.session.dispatch(ViewAction::Back);
            app.exit_reader();
            app.focus = Focus::Sidebar;
        }
        KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(PAGE_LINES)
        }
        KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(PAGE_LINES)
        }
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(PAGE_LINES),
        KeyCode::PageUp => app.scroll_up(PAGE_LINES),
        KeyCode::Char('1') => spawn_analysis(app, Analysis::Summary, event_tx),
        KeyCode::Char('2') => spawn_analysis(app, Analysis::Sentiment, event_tx),
        KeyCode::Char('3') => spawn_analysis(app, Analysis::Keywords, event_tx),
        KeyCode::Char('o') => {
            if let Some(url) = app.reader_url().map(str::to_string) {
                open_in_browser(app, &url);
            }
        }
        KeyCode::Char('c') => open_chat(app),
        _ => {}
    }
    Action::Continue
}

/// Handle input while the chat panel is open.
fn handle_chat_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    match code {
        KeyCode::Esc => app.chat_open = false,
        KeyCode::Enter => send_chat(app, event_tx),
        KeyCode::Backspace => {
            app.chat_input.pop();
        }
        KeyCode::Char(c) => {
            if app.chat_input.len() < MAX_CHAT_INPUT_LENGTH {
                app.chat_input.push(c);
            }
        }
        _ => {}
    }
}

/// Handle input while a feed URL is being edited.
///
/// Enter stores the trimmed text, Esc leaves the entry unchanged.
fn handle_edit_url_input(app: &mut App, code: KeyCode) {
    let InputMode::EditUrl { index, buffer } = &mut app.mode else {
        return;
    };
    match code {
        KeyCode::Char(c) => {
            if buffer.len() < MAX_URL_INPUT_LENGTH {
                buffer.push(c);
            }
        }
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Enter => {
            let (index, url) = (*index, buffer.trim().to_string());
            app.mode = InputMode::Normal;
            if let Err(e) = app.session.sources.set(index, url) {
                app.set_status(e.to_string());
            }
        }
        KeyCode::Esc => app.mode = InputMode::Normal,
        _ => {}
    }
}

/// Handle input in search mode.
fn handle_search_input(app: &mut App, code: KeyCode) {
    let InputMode::Search { buffer } = &mut app.mode else {
        return;
    };
    match code {
        KeyCode::Esc => app.mode = InputMode::Normal,
        KeyCode::Enter => {
            let term = std::mem::take(buffer);
            app.mode = InputMode::Normal;
            tracing::debug!(term = %term, "Applying item filter");
            app.session.search_term = term;
            app.selected_item = 0;
            app.clamp_selections();
            if app.session.filter().is_empty() {
                app.set_status("Filter cleared");
            }
        }
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Char(c) => {
            if buffer.len() >= MAX_SEARCH_QUERY_LENGTH {
                app.set_status(format!(
                    "Search query at max length ({} chars)",
                    MAX_SEARCH_QUERY_LENGTH
                ));
                return;
            }
            buffer.push(c);
        }
        _ => {}
    }
}
