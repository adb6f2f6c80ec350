use crate::config::Config;
use crate::content::{Article, ExtractionError};
use crate::feed::{filter_items, FeedItem, FeedSection};
use crate::llm::{Analysis, LlmError, LlmGateway};
use crate::session::{FeedSources, Session};
use crate::view::View;
use anyhow::Result;
use ratatui::text::Line;
use reqwest::redirect::Policy;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use unicode_width::UnicodeWidthStr;

/// Maximum scroll offset for the reader view (ratatui u16 limit).
pub const MAX_SCROLL: usize = u16::MAX as usize;

/// How long a status message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(3);

// ============================================================================
// HTTP Client Configuration
// ============================================================================

/// Redirect policy with loop detection and at most 5 hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 5 {
            return attempt.error("Too many redirects (max 5)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

// ============================================================================
// Focus and Input Modes
// ============================================================================

/// Which panel receives navigation keys while browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Items,
}

/// Text entry modes that capture the keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Editing the filter; applied on Enter.
    Search { buffer: String },
    /// Editing the feed URL at `index`.
    EditUrl { index: usize, buffer: String },
}

// ============================================================================
// Content and Event Types
// ============================================================================

/// Loading state of the feed item list.
#[derive(Debug, Default)]
pub enum FeedsState {
    #[default]
    Idle,
    Loading {
        done: usize,
        total: usize,
    },
    Loaded(Vec<FeedSection>),
}

/// Loading state of the article shown in the reader.
#[derive(Debug, Clone)]
pub enum ContentState {
    Idle,
    Loading {
        url: String,
    },
    Loaded {
        article: Arc<Article>,
        rendered_lines: Vec<Line<'static>>,
    },
    Failed {
        url: String,
        error: String,
    },
}

/// One analysis block under the article text.
#[derive(Debug, Clone)]
pub enum AnalysisState {
    Pending,
    /// Reply, or the apology text when the call failed.
    Done(Vec<Line<'static>>),
}

/// Events from background tasks
pub enum AppEvent {
    /// One more feed of a batch finished.
    FeedProgress {
        generation: u64,
        done: usize,
        total: usize,
    },
    FeedsLoaded {
        generation: u64,
        sections: Vec<FeedSection>,
    },
    /// Extraction for `url` finished. Always recorded in the article cache,
    /// shown only if the reader is still on `url`.
    ArticleLoaded {
        url: String,
        result: Result<Article, ExtractionError>,
    },
    AnalysisReady {
        url: String,
        analysis: Analysis,
        result: Result<String, LlmError>,
    },
    ChatReply {
        result: Result<String, LlmError>,
    },
    /// A background task panicked before reporting its result.
    TaskPanicked { task: BackgroundTask, error: String },
}

/// Which piece of background work an event belongs to, so a panic can
/// release whatever that work was holding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundTask {
    FeedLoad { generation: u64 },
    Article { url: String },
    Analysis { url: String, analysis: Analysis },
    Chat,
}

impl BackgroundTask {
    pub fn name(&self) -> &'static str {
        match self {
            BackgroundTask::FeedLoad { .. } => "feed_load",
            BackgroundTask::Article { .. } => "article_load",
            BackgroundTask::Analysis { .. } => "analysis",
            BackgroundTask::Chat => "chat",
        }
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state
pub struct App {
    pub session: Session,
    pub http_client: reqwest::Client,
    pub llm: LlmGateway,
    pub feed_timeout: Duration,
    pub article_timeout: Duration,

    // UI State
    pub focus: Focus,
    pub mode: InputMode,
    /// The chat panel replaces the main panel while open.
    pub chat_open: bool,
    pub chat_input: String,
    pub selected_source: usize,
    pub selected_item: usize,
    pub scroll_offset: usize,

    // Feed loading
    pub feeds_state: FeedsState,
    /// Bumped for every new feed load; results from older loads are dropped.
    pub feed_generation: u64,
    pub feed_load_handle: Option<tokio::task::JoinHandle<()>>,

    // Reader
    pub content_state: ContentState,
    pub analyses: HashMap<Analysis, AnalysisState>,

    pub status_message: Option<(Cow<'static, str>, Instant)>,

    /// Dirty flag to skip unnecessary frame renders
    pub needs_redraw: bool,

    /// Last known reader viewport size (visible lines, without borders).
    pub reader_visible_lines: usize,
    /// Last known reader viewport width (characters, without borders).
    pub reader_viewport_width: usize,

    /// Current frame of the loading spinner animation.
    pub spinner_frame: usize,
}

impl App {
    pub fn new(config: &Config, sources: FeedSources) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("newsrss/", env!("CARGO_PKG_VERSION")))
            .redirect(create_redirect_policy())
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let llm = LlmGateway::from_config(&config.llm, http_client.clone());

        Ok(Self {
            session: Session::new(sources),
            http_client,
            llm,
            feed_timeout: config.feed_timeout(),
            article_timeout: config.article_timeout(),
            focus: Focus::Sidebar,
            mode: InputMode::Normal,
            chat_open: false,
            chat_input: String::new(),
            selected_source: 0,
            selected_item: 0,
            scroll_offset: 0,
            feeds_state: FeedsState::Idle,
            feed_generation: 0,
            feed_load_handle: None,
            content_state: ContentState::Idle,
            analyses: HashMap::new(),
            status_message: None,
            needs_redraw: true,
            reader_visible_lines: 0,
            reader_viewport_width: 0,
            spinner_frame: 0,
        })
    }

    pub fn view(&self) -> View {
        self.session.current_view()
    }

    /// Items of the loaded sections that pass the display policy and the
    /// current filter, in section order.
    pub fn visible_items(&self) -> Vec<&FeedItem> {
        match &self.feeds_state {
            FeedsState::Loaded(sections) => {
                let filter = self.session.filter();
                sections
                    .iter()
                    .flat_map(|s| filter_items(s.items(), filter))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn selected_item(&self) -> Option<&FeedItem> {
        self.visible_items().get(self.selected_item).copied()
    }

    pub fn selected_source_url(&self) -> Option<&str> {
        self.session.sources.get(self.selected_source)
    }

    /// Clamp selection indices to valid ranges.
    ///
    /// Call after any operation that may shrink the lists: a feed load, a
    /// filter change or removing a feed URL.
    pub fn clamp_selections(&mut self) {
        let sources = self.session.sources.len();
        self.selected_source = self.selected_source.min(sources.saturating_sub(1));
        let items = self.visible_items().len();
        self.selected_item = self.selected_item.min(items.saturating_sub(1));
    }

    /// Navigate up in current list
    pub fn nav_up(&mut self) {
        match self.focus {
            Focus::Sidebar => self.selected_source = self.selected_source.saturating_sub(1),
            Focus::Items => self.selected_item = self.selected_item.saturating_sub(1),
        }
    }

    /// Navigate down in current list
    pub fn nav_down(&mut self) {
        match self.focus {
            Focus::Sidebar => {
                let max_index = self.session.sources.len().saturating_sub(1);
                self.selected_source = self.selected_source.saturating_add(1).min(max_index);
            }
            Focus::Items => {
                let max_index = self.visible_items().len().saturating_sub(1);
                self.selected_item = self.selected_item.saturating_add(1).min(max_index);
            }
        }
    }

    /// Scroll up in reader view
    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Scroll down in reader view
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    /// Clamp scroll offset so the last line can reach the bottom but not
    /// scroll past it.
    pub fn clamp_scroll(&mut self, content_lines: usize, visible_lines: usize) {
        let max_scroll = content_lines.saturating_sub(visible_lines);
        self.scroll_offset = self.scroll_offset.min(max_scroll).min(MAX_SCROLL);
    }

    /// Calculate how many display lines a single Line will occupy after wrapping.
    fn wrapped_line_count(line: &Line<'_>, viewport_width: usize) -> usize {
        let width = viewport_width.max(1);
        let line_width: usize = line.spans.iter().map(|s| s.content.width()).sum();
        if line_width == 0 {
            1
        } else {
            line_width.div_ceil(width)
        }
    }

    /// Display lines `lines` occupy once wrapped to `width` columns.
    pub fn wrapped_lines(lines: &[Line<'_>], width: usize) -> usize {
        lines
            .iter()
            .map(|line| Self::wrapped_line_count(line, width))
            .sum()
    }

    /// Display lines of the reader after wrapping to the last known width.
    pub fn reader_content_lines(&self, lines: &[Line<'_>]) -> usize {
        Self::wrapped_lines(lines, self.reader_viewport_width)
    }

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired. Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= STATUS_TTL {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    /// Reset reader state for a newly opened article.
    pub fn enter_reader(&mut self, url: &str) {
        self.scroll_offset = 0;
        self.analyses.clear();
        self.content_state = ContentState::Loading {
            url: url.to_string(),
        };
    }

    /// Leave the reader. The view itself is changed by the caller.
    pub fn exit_reader(&mut self) {
        self.content_state = ContentState::Idle;
        self.analyses.clear();
        self.scroll_offset = 0;
    }

    /// URL of the article the reader is showing or loading.
    pub fn reader_url(&self) -> Option<&str> {
        match self.view() {
            View::ArticleDetail(_) => self.session.view().article(),
            _ => None,
        }
    }

    pub fn is_loading_feeds(&self) -> bool {
        matches!(self.feeds_state, FeedsState::Loading { .. })
    }
}

/// Abort an in-flight feed load on exit. Article extractions are left to
/// finish because the article cache waits for their result.
impl Drop for App {
    fn drop(&mut self) {
        if let Some(handle) = self.feed_load_handle.take() {
            handle.abort();
            tracing::debug!("Aborted feed load task on App drop");
        }
    }
}
