use crate::feed::items::{extract_items, FeedItem};
use crate::feed::parser::{parse_document, XmlNode};
use crate::util::parse_http_url;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Default bound on a single feed request.
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while fetching and reading a feed.
///
/// Split into two classes: transport errors (the feed could not be
/// retrieved) and format errors (it was retrieved but is not a usable RSS
/// document). See [`FetchError::is_transport`] and [`FetchError::is_format`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed URL is not an http(s) URL
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body is not well-formed XML
    #[error("Error parsing RSS feed: {0}")]
    Parse(String),
    /// Well-formed XML without the rss → channel → item structure
    #[error("Invalid RSS feed format: missing <{0}>")]
    MissingElement(&'static str),
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::InvalidUrl(_)
                | FetchError::Network(_)
                | FetchError::HttpStatus(_)
                | FetchError::Timeout
                | FetchError::ResponseTooLarge
        )
    }

    pub fn is_format(&self) -> bool {
        matches!(self, FetchError::Parse(_) | FetchError::MissingElement(_))
    }
}

/// Outcome of loading one feed source for display.
///
/// A failed section renders as an error line with zero items; it never
/// prevents the other sections of a batch from loading.
#[derive(Debug)]
pub struct FeedSection {
    pub url: String,
    pub result: Result<Vec<FeedItem>, FetchError>,
}

impl FeedSection {
    /// All parsed items of a successful fetch, or an empty slice.
    pub fn items(&self) -> &[FeedItem] {
        match &self.result {
            Ok(items) => items,
            Err(_) => &[],
        }
    }
}

/// Fetches a feed and parses the body into an element tree.
///
/// # Errors
///
/// - [`FetchError::InvalidUrl`] - not an http(s) URL
/// - [`FetchError::Timeout`] - no complete response within `timeout`
/// - [`FetchError::Network`] - connection or TLS errors
/// - [`FetchError::HttpStatus`] - non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
/// - [`FetchError::Parse`] - body is not well-formed XML
///
/// No retry is attempted; the caller reports the failure and moves on.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<XmlNode, FetchError> {
    let parsed = parse_http_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

    let bytes = tokio::time::timeout(timeout, async {
        let response = client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_FEED_SIZE).await
    })
    .await
    .map_err(|_| FetchError::Timeout)??;

    parse_document(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

/// Fetches one feed and extracts all of its items (unfiltered).
pub async fn load_section(client: &reqwest::Client, url: &str, timeout: Duration) -> FeedSection {
    let result = match fetch_feed(client, url, timeout).await {
        Ok(doc) => extract_items(&doc),
        Err(e) => Err(e),
    };

    match &result {
        Ok(items) => tracing::debug!(feed = %url, items = items.len(), "Feed loaded"),
        Err(e) if e.is_transport() => {
            tracing::warn!(feed = %url, error = %e, "Feed unavailable")
        }
        Err(e) => tracing::warn!(feed = %url, error = %e, "Feed has invalid format"),
    }

    FeedSection {
        url: url.to_string(),
        result,
    }
}

/// Loads every URL in order, one after another.
///
/// A failure in one feed is recorded in its section and never aborts the
/// remaining feeds. `on_progress` is called with `(done, total)` after each
/// feed completes.
pub async fn load_all<F>(
    client: &reqwest::Client,
    urls: &[String],
    timeout: Duration,
    mut on_progress: F,
) -> Vec<FeedSection>
where
    F: FnMut(usize, usize),
{
    let total = urls.len();
    let mut sections = Vec::with_capacity(total);

    for (i, url) in urls.iter().enumerate() {
        sections.push(load_section(client, url, timeout).await);
        on_progress(i + 1, total);
    }

    let failed = sections.iter().filter(|s| s.result.is_err()).count();
    if failed > 0 {
        tracing::info!(total, failed, "Batch feed load finished with failures");
    }

    sections
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
