//! Which main-panel view is showing.
//!
//! [`ViewState`] is an immutable value: every user action goes through
//! [`ViewState::apply`], which returns the next state. The flags can in
//! principle overlap, so [`ViewState::current`] resolves them by priority:
//! article detail, then a single feed, then all feeds, then the idle
//! placeholder.

/// The resolved view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Idle,
    SingleFeed(String),
    AllFeeds,
    ArticleDetail(String),
}

/// A user action that changes the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    SelectFeed(String),
    ShowAllFeeds,
    OpenArticle(String),
    Back,
    /// The chat panel takes over the main area.
    OpenChat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    active_feed: Option<String>,
    all_feeds: bool,
    article: Option<String>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn apply(&self, action: ViewAction) -> ViewState {
        match action {
            ViewAction::SelectFeed(url) => ViewState {
                active_feed: Some(url),
                all_feeds: false,
                article: None,
            },
            ViewAction::ShowAllFeeds => ViewState {
                active_feed: None,
                all_feeds: true,
                article: None,
            },
            ViewAction::OpenArticle(url) => ViewState {
                article: Some(url),
                ..self.clone()
            },
            ViewAction::Back | ViewAction::OpenChat => ViewState::default(),
        }
    }

    pub fn current(&self) -> View {
        if let Some(url) = &self.article {
            View::ArticleDetail(url.clone())
        } else if let Some(url) = &self.active_feed {
            View::SingleFeed(url.clone())
        } else if self.all_feeds {
            View::AllFeeds
        } else {
            View::Idle
        }
    }

    pub fn active_feed(&self) -> Option<&str> {
        self.active_feed.as_deref()
    }

    pub fn is_all_feeds(&self) -> bool {
        self.all_feeds
    }

    pub fn article(&self) -> Option<&str> {
        self.article.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_starts_idle() {
        assert_eq!(ViewState::new().current(), View::Idle);
    }

    #[test]
    fn test_back_from_article_clears_everything() {
        let state = ViewState::new()
            .apply(ViewAction::ShowAllFeeds)
            .apply(ViewAction::OpenArticle("https://a.example/x".into()));
        assert_eq!(
            state.current(),
            View::ArticleDetail("https://a.example/x".into())
        );

        let back = state.apply(ViewAction::Back);
        assert_eq!(back.current(), View::Idle);
        assert!(!back.is_all_feeds());
        assert_eq!(back.article(), None);
        assert_eq!(back.active_feed(), None);
    }

    #[test]
    fn test_article_has_priority_over_feed() {
        let state = ViewState::new()
            .apply(ViewAction::SelectFeed("https://f.example/rss".into()))
            .apply(ViewAction::OpenArticle("https://a.example/1".into()));
        assert_eq!(state.current(), View::ArticleDetail("https://a.example/1".into()));
        // The feed underneath is still remembered
        assert_eq!(state.active_feed(), Some("https://f.example/rss"));
    }

    #[test]
    fn test_feed_and_all_feeds_replace_each_other() {
        let single = ViewState::new()
            .apply(ViewAction::ShowAllFeeds)
            .apply(ViewAction::SelectFeed("u".into()));
        assert_eq!(single.current(), View::SingleFeed("u".into()));
        assert!(!single.is_all_feeds());

        let all = single.apply(ViewAction::ShowAllFeeds);
        assert_eq!(all.current(), View::AllFeeds);
        assert_eq!(all.active_feed(), None);
    }

    #[test]
    fn test_selecting_feed_leaves_article() {
        let state = ViewState::new()
            .apply(ViewAction::OpenArticle("a".into()))
            .apply(ViewAction::SelectFeed("f".into()));
        assert_eq!(state.current(), View::SingleFeed("f".into()));
    }

    #[test]
    fn test_open_chat_clears_view() {
        let state = ViewState::new()
            .apply(ViewAction::SelectFeed("f".into()))
            .apply(ViewAction::OpenChat);
        assert_eq!(state.current(), View::Idle);
    }

    #[test]
    fn test_apply_does_not_mutate() {
        let before = ViewState::new().apply(ViewAction::ShowAllFeeds);
        let _after = before.apply(ViewAction::Back);
        assert_eq!(before.current(), View::AllFeeds);
    }
}
