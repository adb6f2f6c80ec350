//! State that lives for one run of the reader and is dropped at exit.

use crate::content::ArticleCache;
use crate::view::{View, ViewAction, ViewState};
use thiserror::Error;

pub const DEFAULT_FEED_URL: &str = "http://feeds.nytimes.com/nyt/rss/Technology";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Cannot remove the last URL. Please clear the URL instead.")]
    LastEntry,
    #[error("No feed URL at position {0}")]
    OutOfRange(usize),
}

/// The user-editable list of feed URLs.
///
/// Order is kept and duplicates are allowed. Entries may be blank while the
/// user is editing; [`FeedSources::active_urls`] skips those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSources {
    urls: Vec<String>,
}

impl Default for FeedSources {
    fn default() -> Self {
        Self {
            urls: vec![DEFAULT_FEED_URL.to_string()],
        }
    }
}

impl FeedSources {
    /// An empty input list becomes a single blank entry; the list is never
    /// empty.
    pub fn new(urls: Vec<String>) -> Self {
        if urls.is_empty() {
            return Self {
                urls: vec![String::new()],
            };
        }
        Self { urls }
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.urls.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    /// Appends a blank entry and returns its index.
    pub fn add(&mut self) -> usize {
        self.urls.push(String::new());
        self.urls.len() - 1
    }

    pub fn remove_last(&mut self) -> Result<(), SourceError> {
        if self.urls.len() <= 1 {
            return Err(SourceError::LastEntry);
        }
        self.urls.pop();
        Ok(())
    }

    pub fn set(&mut self, index: usize, url: impl Into<String>) -> Result<(), SourceError> {
        let slot = self
            .urls
            .get_mut(index)
            .ok_or(SourceError::OutOfRange(index))?;
        *slot = url.into();
        Ok(())
    }

    /// Trimmed, non-blank URLs in list order.
    pub fn active_urls(&self) -> Vec<String> {
        self.urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

/// Append-only chat transcript.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: Role::User,
            text: text.into(),
        });
    }

    pub fn push_bot(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: Role::Bot,
            text: text.into(),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether the last message is the user's and still awaits a reply.
    pub fn awaiting_reply(&self) -> bool {
        matches!(self.messages.last(), Some(m) if m.role == Role::User)
    }
}

/// Everything one reading session owns.
#[derive(Debug, Default)]
pub struct Session {
    pub sources: FeedSources,
    view: ViewState,
    pub search_term: String,
    pub articles: ArticleCache,
    pub chat: ChatLog,
}

impl Session {
    pub fn new(sources: FeedSources) -> Self {
        Self {
            sources,
            ..Self::default()
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn current_view(&self) -> View {
        self.view.current()
    }

    /// Replaces the view state with the result of `action`.
    pub fn dispatch(&mut self, action: ViewAction) -> View {
        tracing::debug!(?action, "View action");
        self.view = self.view.apply(action);
        self.view.current()
    }

    /// Trimmed filter, empty when no filter applies.
    pub fn filter(&self) -> &str {
        self.search_term.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_source_list() {
        let sources = FeedSources::default();
        assert_eq!(sources.active_urls(), vec![DEFAULT_FEED_URL.to_string()]);
    }

    #[test]
    fn test_add_set_and_active_urls() {
        let mut sources = FeedSources::new(vec!["https://a.example/rss".into()]);
        let idx = sources.add();
        assert_eq!(idx, 1);
        assert_eq!(sources.get(1), Some(""));
        assert_eq!(sources.active_urls().len(), 1);

        sources.set(1, "  https://b.example/rss  ").unwrap();
        let second = sources.add();
        sources.set(second, "https://a.example/rss").unwrap();
        assert_eq!(
            sources.active_urls(),
            vec![
                "https://a.example/rss".to_string(),
                "https://b.example/rss".to_string(),
                "https://a.example/rss".to_string(),
            ]
        );
    }

    #[test]
    fn test_cannot_remove_last_entry() {
        let mut sources = FeedSources::new(vec!["u".into()]);
        let err = sources.remove_last().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot remove the last URL. Please clear the URL instead."
        );
        assert_eq!(sources.len(), 1);

        sources.add();
        assert!(sources.remove_last().is_ok());
        assert_eq!(sources.len(), 1);
        assert_eq!(sources.get(0), Some("u"));
    }

    #[test]
    fn test_set_out_of_range() {
        let mut sources = FeedSources::default();
        assert_eq!(sources.set(5, "x"), Err(SourceError::OutOfRange(5)));
    }

    #[test]
    fn test_empty_list_gets_blank_entry() {
        let sources = FeedSources::new(Vec::new());
        assert_eq!(sources.len(), 1);
        assert!(sources.active_urls().is_empty());
    }

    #[test]
    fn test_chat_log_order() {
        let mut chat = ChatLog::default();
        chat.push_user("hi");
        assert!(chat.awaiting_reply());
        chat.push_bot("Bot Response");
        assert!(!chat.awaiting_reply());
        let roles: Vec<_> = chat.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Bot]);
    }

    #[test]
    fn test_session_dispatch() {
        let mut session = Session::new(FeedSources::default());
        assert_eq!(session.dispatch(ViewAction::ShowAllFeeds), View::AllFeeds);
        assert_eq!(
            session.dispatch(ViewAction::OpenArticle("a".into())),
            View::ArticleDetail("a".into())
        );
        assert_eq!(session.dispatch(ViewAction::Back), View::Idle);
        assert!(!session.view().is_all_feeds());
    }
}
