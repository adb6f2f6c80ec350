//! Helper functions for UI operations.
//!
//! Background work (feed loads, article extraction, model calls) is spawned
//! from here. Every task reports back through an [`AppEvent`]; panics are
//! caught and reported as [`AppEvent::TaskPanicked`].

use crate::app::{AnalysisState, App, AppEvent, BackgroundTask, ContentState, FeedsState};
use crate::content::{fetch_article, CacheLookup};
use crate::feed::{load_all, load_section};
use crate::llm::Analysis;
use crate::util::validate_url_for_open;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

use super::reader::render_article;

pub(super) const ERR_NO_SOURCES: &str = "Please enter at least one RSS Feed URL.";
pub(super) const ERR_ITEM_NO_LINK: &str = "This item has no article link";

/// Wraps a future to catch panics and convert them to errors.
///
/// Returns `Ok(result)` if the future completes normally, or
/// `Err(panic_message)` if it panics.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Spawns `work` and sends whatever event it produces; a panic becomes
/// [`AppEvent::TaskPanicked`].
fn spawn_reporting<F>(
    task: BackgroundTask,
    tx: mpsc::Sender<AppEvent>,
    work: F,
) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    let name = task.name();
    tokio::spawn(async move {
        let event = match catch_task_panic(work).await {
            Ok(event) => event,
            Err(panic_msg) => {
                tracing::error!(task = name, error = %panic_msg, "Background task panicked");
                AppEvent::TaskPanicked {
                    task,
                    error: panic_msg,
                }
            }
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(task = name, error = %e, "Channel send failed (receiver dropped)");
        }
    })
}

/// Starts loading `urls` for the item list, replacing any load in flight.
///
/// A single URL is one request; several URLs are fetched one after another
/// with progress events in between.
pub(super) fn spawn_feed_load(app: &mut App, urls: Vec<String>, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(handle) = app.feed_load_handle.take() {
        handle.abort();
        tracing::debug!("Aborted previous feed load task");
    }

    app.feed_generation = app.feed_generation.wrapping_add(1);
    let generation = app.feed_generation;
    let total = urls.len();
    app.feeds_state = FeedsState::Loading { done: 0, total };
    app.selected_item = 0;

    let client = app.http_client.clone();
    let timeout = app.feed_timeout;
    let tx = event_tx.clone();
    let progress_tx = event_tx.clone();

    tracing::debug!(generation, feeds = total, "Spawning feed load");

    let task = BackgroundTask::FeedLoad { generation };
    app.feed_load_handle = Some(spawn_reporting(task, tx, async move {
        let sections = if let [url] = urls.as_slice() {
            vec![load_section(&client, url, timeout).await]
        } else {
            load_all(&client, &urls, timeout, |done, total| {
                // Progress is best-effort; a full channel just skips an update
                let _ = progress_tx.try_send(AppEvent::FeedProgress {
                    generation,
                    done,
                    total,
                });
            })
            .await
        };
        AppEvent::FeedsLoaded {
            generation,
            sections,
        }
    }));
}

/// Opens the reader on `url`, extracting the article unless the session
/// already has it or an extraction is in flight.
pub(super) fn open_article(app: &mut App, url: String, event_tx: &mpsc::Sender<AppEvent>) {
    app.enter_reader(&url);

    match app.session.articles.begin(&url) {
        CacheLookup::Hit(article) => {
            let rendered_lines = render_article(&article);
            app.content_state = ContentState::Loaded {
                article,
                rendered_lines,
            };
        }
        CacheLookup::Failed(error) => {
            tracing::debug!(url = %url, "Extraction already failed this session");
            app.content_state = ContentState::Failed { url, error };
        }
        CacheLookup::Pending => {
            tracing::debug!(url = %url, "Extraction already in progress, waiting");
        }
        CacheLookup::Miss => {
            let client = app.http_client.clone();
            let timeout = app.article_timeout;
            tracing::debug!(url = %url, "Starting article extraction");
            let task = BackgroundTask::Article { url: url.clone() };
            spawn_reporting(task, event_tx.clone(), async move {
                let result = fetch_article(&client, &url, timeout).await;
                AppEvent::ArticleLoaded { url, result }
            });
        }
    }
}

/// Runs one analysis over the article in the reader.
pub(super) fn spawn_analysis(app: &mut App, analysis: Analysis, event_tx: &mpsc::Sender<AppEvent>) {
    // Keyed by the link that was opened, which may differ from the
    // normalized URL stored on the article.
    let Some(url) = app.reader_url().map(str::to_string) else {
        return;
    };
    let text = match &app.content_state {
        ContentState::Loaded { article, .. } if article.text.is_empty() => article.title.clone(),
        ContentState::Loaded { article, .. } => article.text.clone(),
        _ => {
            app.set_status("Article is not loaded yet");
            return;
        }
    };
    if matches!(app.analyses.get(&analysis), Some(AnalysisState::Pending)) {
        return;
    }
    app.analyses.insert(analysis, AnalysisState::Pending);

    let llm = app.llm.clone();
    tracing::debug!(url = %url, ?analysis, "Requesting analysis");
    let task = BackgroundTask::Analysis {
        url: url.clone(),
        analysis,
    };
    spawn_reporting(task, event_tx.clone(), async move {
        let result = llm.analyze(analysis, &text).await;
        AppEvent::AnalysisReady {
            url,
            analysis,
            result,
        }
    });
}

/// Records the user's chat message and asks the model for a reply.
pub(super) fn send_chat(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let message = app.chat_input.trim().to_string();
    if message.is_empty() {
        return;
    }
    if app.session.chat.awaiting_reply() {
        app.set_status("Waiting for the previous reply");
        return;
    }
    app.chat_input.clear();
    app.session.chat.push_user(message.clone());

    let llm = app.llm.clone();
    spawn_reporting(BackgroundTask::Chat, event_tx.clone(), async move {
        let result = llm.chat(&message).await;
        AppEvent::ChatReply { result }
    });
}

/// Hands a link to the system browser after checking it is safe to open.
pub(super) fn open_in_browser(app: &mut App, url: &str) {
    if let Err(e) = validate_url_for_open(url) {
        app.set_status(format!("Refusing to open link: {}", e));
    } else if let Err(e) = open::that(url) {
        app.set_status(format!("Failed to open browser: {}", e));
    } else {
        app.set_status("Opened in browser");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_passes_value() {
        assert_eq!(catch_task_panic(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_catch_task_panic_reports_message() {
        let result: Result<(), String> = catch_task_panic(async { panic!("boom") }).await;
        assert_eq!(result, Err("boom".to_string()));

        let result: Result<(), String> =
            catch_task_panic(async { panic!("{} {}", "formatted", 1) }).await;
        assert_eq!(result, Err("formatted 1".to_string()));
    }
}
