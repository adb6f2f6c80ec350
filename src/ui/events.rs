//! Application event handling.
//!
//! Applies the results of background tasks (feed loads, article
//! extraction, analyses and chat replies) to the application state.

use crate::app::{AnalysisState, App, AppEvent, BackgroundTask, ContentState, FeedsState};
use crate::content::{Article, ExtractionError};
use crate::feed::FeedSection;
use crate::llm::{Analysis, LlmError, CALL_FAILED_MESSAGE};
use crate::util::strip_control_chars;

use super::reader::{render_article, render_markdown};

/// Handle application events from background tasks.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::FeedProgress {
            generation,
            done,
            total,
        } => {
            if generation == app.feed_generation && app.is_loading_feeds() {
                app.feeds_state = FeedsState::Loading { done, total };
            }
        }
        AppEvent::FeedsLoaded {
            generation,
            sections,
        } => handle_feeds_loaded(app, generation, sections),
        AppEvent::ArticleLoaded { url, result } => handle_article_loaded(app, url, result),
        AppEvent::AnalysisReady {
            url,
            analysis,
            result,
        } => handle_analysis_ready(app, &url, analysis, result),
        AppEvent::ChatReply { result } => {
            let reply = match result {
                Ok(text) => strip_control_chars(&text).into_owned(),
                Err(e) => {
                    tracing::warn!(error = %e, "Chat reply failed");
                    e.user_message().to_string()
                }
            };
            app.session.chat.push_bot(reply);
        }
        AppEvent::TaskPanicked { task, error } => handle_task_panicked(app, task, error),
    }
}

/// Undoes whatever the dead task left marked as in progress.
fn handle_task_panicked(app: &mut App, task: BackgroundTask, error: String) {
    app.set_status(format!("Internal error in {}: {}", task.name(), error));
    match task {
        BackgroundTask::FeedLoad { generation } => {
            if generation == app.feed_generation {
                app.feed_load_handle = None;
                app.feeds_state = FeedsState::Idle;
            }
        }
        BackgroundTask::Article { url } => {
            app.session.articles.abandon(&url);
            if app.reader_url() == Some(url.as_str()) {
                app.content_state = ContentState::Failed { url, error };
            }
        }
        BackgroundTask::Analysis { url, analysis } => {
            if app.reader_url() == Some(url.as_str())
                && matches!(app.analyses.get(&analysis), Some(AnalysisState::Pending))
            {
                app.analyses.remove(&analysis);
            }
        }
        BackgroundTask::Chat => {
            if app.session.chat.awaiting_reply() {
                app.session.chat.push_bot(CALL_FAILED_MESSAGE);
            }
        }
    }
}

fn handle_feeds_loaded(app: &mut App, generation: u64, sections: Vec<FeedSection>) {
    // A newer load replaced this one while it was running
    if generation != app.feed_generation {
        tracing::debug!(
            expected = app.feed_generation,
            got = generation,
            "Ignoring stale feed load (generation mismatch)"
        );
        return;
    }
    app.feed_load_handle = None;

    let failed = sections.iter().filter(|s| s.result.is_err()).count();
    let items: usize = sections.iter().map(|s| s.items().len()).sum();
    tracing::info!(
        feeds = sections.len(),
        failed,
        items,
        "Feed load complete"
    );

    if failed > 0 {
        app.set_status(format!(
            "{} of {} feeds failed to load",
            failed,
            sections.len()
        ));
    }

    app.feeds_state = FeedsState::Loaded(sections);
    app.clamp_selections();
}

fn handle_article_loaded(app: &mut App, url: String, result: Result<Article, ExtractionError>) {
    if let Err(e) = &result {
        tracing::warn!(url = %url, error = %e, "Article extraction failed");
    }
    let result = app.session.articles.complete(&url, result);

    // The user may have moved on while the extraction ran
    if app.reader_url() != Some(url.as_str()) {
        tracing::debug!(url = %url, "Article loaded for a closed reader, cached only");
        return;
    }

    app.content_state = match result {
        Ok(article) => {
            let rendered_lines = render_article(&article);
            ContentState::Loaded {
                article,
                rendered_lines,
            }
        }
        Err(e) => ContentState::Failed {
            url,
            error: e.to_string(),
        },
    };
}

fn handle_analysis_ready(
    app: &mut App,
    url: &str,
    analysis: Analysis,
    result: Result<String, LlmError>,
) {
    if app.reader_url() != Some(url) {
        tracing::debug!(url = %url, ?analysis, "Dropping analysis for a closed article");
        return;
    }
    let reply = match result {
        Ok(text) => strip_control_chars(&text).into_owned(),
        Err(e) => {
            app.set_status(format!("{} failed: {}", analysis.label(), e));
            e.user_message().to_string()
        }
    };
    app.analyses
        .insert(analysis, AnalysisState::Done(render_markdown(&reply)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LlmProvider};
    use crate::feed::{FeedItem, FetchError};
    use crate::session::{FeedSources, Role};
    use crate::view::ViewAction;
    use pretty_assertions::assert_eq;

    fn test_app() -> App {
        let mut config = Config::default();
        config.llm.provider = LlmProvider::Stub;
        App::new(&config, FeedSources::default()).unwrap()
    }

    fn article(url: &str) -> Article {
        Article {
            url: url.to_string(),
            title: "Title".into(),
            text: "Body text.".into(),
            authors: Vec::new(),
            publish_date: None,
            top_image: None,
        }
    }

    fn open_reader(app: &mut App, url: &str) {
        app.session.dispatch(ViewAction::OpenArticle(url.to_string()));
        app.enter_reader(url);
        app.session.articles.begin(url);
    }

    #[test]
    fn test_stale_feed_load_is_ignored() {
        let mut app = test_app();
        app.feed_generation = 2;
        app.feeds_state = FeedsState::Loading { done: 0, total: 1 };

        handle_app_event(
            &mut app,
            AppEvent::FeedsLoaded {
                generation: 1,
                sections: Vec::new(),
            },
        );
        assert!(app.is_loading_feeds());

        handle_app_event(
            &mut app,
            AppEvent::FeedProgress {
                generation: 1,
                done: 1,
                total: 3,
            },
        );
        assert!(matches!(
            app.feeds_state,
            FeedsState::Loading { done: 0, total: 1 }
        ));
    }

    #[test]
    fn test_feed_load_reports_failures() {
        let mut app = test_app();
        app.feed_generation = 1;
        let sections = vec![
            FeedSection {
                url: "a".into(),
                result: Ok(vec![FeedItem {
                    title: "t".into(),
                    description: "a description that is long enough".into(),
                    link: "https://a.example/1".into(),
                    image_url: None,
                }]),
            },
            FeedSection {
                url: "b".into(),
                result: Err(FetchError::HttpStatus(500)),
            },
        ];
        handle_app_event(
            &mut app,
            AppEvent::FeedsLoaded {
                generation: 1,
                sections,
            },
        );
        assert_eq!(app.visible_items().len(), 1);
        let (msg, _) = app.status_message.as_ref().unwrap();
        assert_eq!(msg, "1 of 2 feeds failed to load");
    }

    #[test]
    fn test_article_loaded_shows_in_open_reader() {
        let mut app = test_app();
        open_reader(&mut app, "https://a.example/1");

        handle_app_event(
            &mut app,
            AppEvent::ArticleLoaded {
                url: "https://a.example/1".into(),
                result: Ok(article("https://a.example/1")),
            },
        );
        assert!(matches!(app.content_state, ContentState::Loaded { .. }));
        assert!(app.session.articles.get("https://a.example/1").is_some());
    }

    #[test]
    fn test_article_loaded_after_leaving_is_cached_only() {
        let mut app = test_app();
        open_reader(&mut app, "https://a.example/1");
        app.session.dispatch(ViewAction::Back);
        app.exit_reader();

        handle_app_event(
            &mut app,
            AppEvent::ArticleLoaded {
                url: "https://a.example/1".into(),
                result: Ok(article("https://a.example/1")),
            },
        );
        assert!(matches!(app.content_state, ContentState::Idle));
        assert!(!app.session.articles.is_pending("https://a.example/1"));
        assert_eq!(app.session.articles.len(), 1);
    }

    #[test]
    fn test_article_failure_is_shown_and_remembered() {
        let mut app = test_app();
        open_reader(&mut app, "https://a.example/1");

        handle_app_event(
            &mut app,
            AppEvent::ArticleLoaded {
                url: "https://a.example/1".into(),
                result: Err(ExtractionError::HttpStatus(404)),
            },
        );
        assert!(matches!(app.content_state, ContentState::Failed { .. }));
        assert!(app.session.articles.has_failed("https://a.example/1"));
        assert!(!app.session.articles.is_pending("https://a.example/1"));
    }

    #[test]
    fn test_panicked_article_task_releases_url() {
        let mut app = test_app();
        open_reader(&mut app, "https://a.example/1");
        assert!(app.session.articles.is_pending("https://a.example/1"));

        handle_app_event(
            &mut app,
            AppEvent::TaskPanicked {
                task: BackgroundTask::Article {
                    url: "https://a.example/1".into(),
                },
                error: "boom".into(),
            },
        );
        assert!(!app.session.articles.is_pending("https://a.example/1"));
        assert!(!app.session.articles.has_failed("https://a.example/1"));
        assert!(matches!(
            &app.content_state,
            ContentState::Failed { error, .. } if error == "boom"
        ));
        let (msg, _) = app.status_message.as_ref().unwrap();
        assert_eq!(msg, "Internal error in article_load: boom");
    }

    #[test]
    fn test_panicked_analysis_can_be_requested_again() {
        let mut app = test_app();
        open_reader(&mut app, "u");
        app.analyses.insert(Analysis::Sentiment, AnalysisState::Pending);

        handle_app_event(
            &mut app,
            AppEvent::TaskPanicked {
                task: BackgroundTask::Analysis {
                    url: "u".into(),
                    analysis: Analysis::Sentiment,
                },
                error: "boom".into(),
            },
        );
        assert!(app.analyses.get(&Analysis::Sentiment).is_none());
    }

    #[test]
    fn test_panicked_chat_unblocks_input() {
        let mut app = test_app();
        app.session.chat.push_user("hello");
        assert!(app.session.chat.awaiting_reply());

        handle_app_event(
            &mut app,
            AppEvent::TaskPanicked {
                task: BackgroundTask::Chat,
                error: "boom".into(),
            },
        );
        assert!(!app.session.chat.awaiting_reply());
        assert_eq!(
            app.session.chat.messages()[1].text,
            "I'm sorry, I encountered an error processing your request."
        );
    }

    #[test]
    fn test_panicked_feed_load_stops_loading() {
        let mut app = test_app();
        app.feed_generation = 3;
        app.feeds_state = FeedsState::Loading { done: 1, total: 4 };

        handle_app_event(
            &mut app,
            AppEvent::TaskPanicked {
                task: BackgroundTask::FeedLoad { generation: 2 },
                error: "old".into(),
            },
        );
        assert!(app.is_loading_feeds());

        handle_app_event(
            &mut app,
            AppEvent::TaskPanicked {
                task: BackgroundTask::FeedLoad { generation: 3 },
                error: "boom".into(),
            },
        );
        assert!(!app.is_loading_feeds());
        assert!(matches!(app.feeds_state, FeedsState::Idle));
    }

    #[test]
    fn test_analysis_error_shows_apology() {
        let mut app = test_app();
        open_reader(&mut app, "u");

        handle_app_event(
            &mut app,
            AppEvent::AnalysisReady {
                url: "u".into(),
                analysis: Analysis::Keywords,
                result: Err(LlmError::EmptyResponse),
            },
        );
        let Some(AnalysisState::Done(lines)) = app.analyses.get(&Analysis::Keywords) else {
            panic!("analysis not recorded");
        };
        let text: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(
            text,
            "I'm sorry, I encountered an error processing your request."
        );
    }

    #[test]
    fn test_analysis_for_other_article_is_dropped() {
        let mut app = test_app();
        open_reader(&mut app, "u");

        handle_app_event(
            &mut app,
            AppEvent::AnalysisReady {
                url: "other".into(),
                analysis: Analysis::Summary,
                result: Ok("short".into()),
            },
        );
        assert!(app.analyses.is_empty());
    }

    #[test]
    fn test_chat_reply_appends_bot_message() {
        let mut app = test_app();
        app.session.chat.push_user("hello");
        handle_app_event(
            &mut app,
            AppEvent::ChatReply {
                result: Ok("Bot Response".into()),
            },
        );
        handle_app_event(
            &mut app,
            AppEvent::ChatReply {
                result: Err(LlmError::Unavailable("no key".into())),
            },
        );
        let messages = app.session.chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::Bot);
        assert_eq!(messages[1].text, "Bot Response");
        assert_eq!(
            messages[2].text,
            "I'm sorry, the Gemini model is not available."
        );
    }
}
