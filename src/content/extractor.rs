use crate::util::{collapse_whitespace, parse_http_url, strip_control_chars};
use chrono::{DateTime, NaiveDate, Utc};
use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_CONTENT_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// How far into the page a `<meta charset>` declaration is looked for.
const CHARSET_SNIFF_LEN: usize = 1024;

/// Default bound on an article page request.
pub const DEFAULT_ARTICLE_TIMEOUT: Duration = Duration::from_secs(20);

/// CSS selectors targeting main article content across common platforms.
/// Order matters: more specific selectors first, generic fallbacks last.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "[itemprop='articleBody']",
    ".entry-content",
    ".post-content",
    ".article-content",
    ".article-body",
    ".story-body",
    ".post-body",
    "main",
];

/// If the content container yields less text than this, all paragraphs of
/// the page are used instead.
const MIN_CONTENT_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("No article content found")]
    Empty,
}

/// Full extracted content of the page an item links to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub url: String,
    pub title: String,
    /// Body paragraphs separated by blank lines.
    pub text: String,
    pub authors: Vec<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub top_image: Option<String>,
}

/// Downloads `url` and extracts an [`Article`] from the HTML.
pub async fn fetch_article(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Article, ExtractionError> {
    let page_url = parse_http_url(url).map_err(|e| ExtractionError::InvalidUrl(e.to_string()))?;

    let html = tokio::time::timeout(timeout, download(client, &page_url))
        .await
        .map_err(|_| ExtractionError::Timeout(timeout))??;

    let article = extract_article(&page_url, &html)?;
    tracing::debug!(
        url = %page_url,
        title = %article.title,
        text_len = article.text.len(),
        authors = article.authors.len(),
        "Article extracted"
    );
    Ok(article)
}

async fn download(client: &reqwest::Client, url: &Url) -> Result<String, ExtractionError> {
    let response = client
        .get(url.as_str())
        .header("Accept", "text/html,application/xhtml+xml")
        .send()
        .await
        .map_err(ExtractionError::Network)?;

    if !response.status().is_success() {
        return Err(ExtractionError::HttpStatus(response.status().as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = read_limited_bytes(response, MAX_CONTENT_SIZE).await?;
    Ok(decode_html(&bytes, content_type.as_deref()))
}

/// Decodes a page using the charset named by the Content-Type header, then
/// by a `<meta>` declaration near the top of the page, then UTF-8.
///
/// A byte order mark wins over both. Malformed sequences become U+FFFD.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_param)
        .or_else(|| sniff_meta_charset(&bytes[..bytes.len().min(CHARSET_SNIFF_LEN)]))
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = used.name(), "Page contained malformed sequences");
    }
    text.into_owned()
}

/// Value of the `charset` parameter in a Content-Type style string.
fn charset_param(value: &str) -> Option<&str> {
    value.split(';').skip(1).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| val.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}

/// Finds `<meta charset="x">` or `<meta http-equiv=... content="...; charset=x">`.
fn sniff_meta_charset(head: &[u8]) -> Option<&str> {
    let head = std::str::from_utf8(head)
        .or_else(|e| std::str::from_utf8(&head[..e.valid_up_to()]))
        .ok()?;
    let lower = head.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    // `lower` is an ASCII lowercasing of `head`, so offsets line up
    let rest = head[start..].trim_start_matches(|c| c == '"' || c == '\'');
    let end = rest
        .find(|c: char| c == '"' || c == '\'' || c == ';' || c == '>' || c.is_whitespace())
        .unwrap_or(rest.len());
    let label = &rest[..end];
    (!label.is_empty()).then_some(label)
}

/// Extracts the article fields from a downloaded HTML page.
///
/// Fails with [`ExtractionError::Empty`] when the page has neither a title
/// nor any body text.
pub fn extract_article(page_url: &Url, html: &str) -> Result<Article, ExtractionError> {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let text = extract_text(&document);
    if title.is_empty() && text.is_empty() {
        return Err(ExtractionError::Empty);
    }

    Ok(Article {
        url: page_url.to_string(),
        title,
        text,
        authors: extract_authors(&document),
        publish_date: extract_publish_date(&document),
        top_image: extract_top_image(&document, page_url),
    })
}

fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(e) => {
            tracing::error!(selector = css, error = ?e, "Invalid CSS selector");
            Vec::new()
        }
    }
}

/// First non-empty value of `attr` on elements matching `css`.
fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    select_all(document, css)
        .into_iter()
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn element_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn clean(s: &str) -> String {
    strip_control_chars(s.trim()).into_owned()
}

fn extract_title(document: &Html) -> String {
    first_attr(document, "meta[property='og:title']", "content")
        .or_else(|| {
            ["title", "h1"].iter().find_map(|css| {
                select_all(document, css)
                    .first()
                    .map(element_text)
                    .filter(|t| !t.is_empty())
            })
        })
        .map(|t| clean(&t))
        .unwrap_or_default()
}

/// JSON-LD blocks on the page, flattening top-level arrays and `@graph`.
fn json_ld_objects(document: &Html) -> Vec<serde_json::Value> {
    let mut objects = Vec::new();
    for script in select_all(document, "script[type='application/ld+json']") {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(raw.trim()) else {
            continue;
        };
        match value {
            serde_json::Value::Array(items) => objects.extend(items),
            serde_json::Value::Object(ref obj) => {
                if let Some(serde_json::Value::Array(graph)) = obj.get("@graph") {
                    objects.extend(graph.iter().cloned());
                }
                objects.push(value);
            }
            _ => {}
        }
    }
    objects
}

fn json_ld_authors(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::String(name) => vec![name.clone()],
        serde_json::Value::Object(obj) => obj
            .get("name")
            .and_then(|n| n.as_str())
            .map(|n| vec![n.to_string()])
            .unwrap_or_default(),
        serde_json::Value::Array(items) => items.iter().flat_map(json_ld_authors).collect(),
        _ => Vec::new(),
    }
}

fn looks_like_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with('/')
}

fn extract_authors(document: &Html) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    for css in ["meta[name='author']", "meta[property='article:author']"] {
        for el in select_all(document, css) {
            if let Some(content) = el.value().attr("content") {
                candidates.extend(content.split(',').map(str::to_string));
            }
        }
    }

    for obj in json_ld_objects(document) {
        if let Some(author) = obj.get("author") {
            candidates.extend(json_ld_authors(author));
        }
    }

    for el in select_all(document, "[rel='author']") {
        candidates.push(element_text(&el));
    }

    let mut authors: Vec<String> = Vec::new();
    for candidate in candidates {
        let name = clean(candidate.trim_start_matches("By ").trim_start_matches("by "));
        if name.is_empty() || looks_like_url(&name) {
            continue;
        }
        if !authors.iter().any(|a| a.eq_ignore_ascii_case(&name)) {
            authors.push(name);
        }
    }
    authors
}

/// Parses the date formats seen in article metadata.
///
/// Accepts RFC 3339, RFC 2822 and bare `YYYY-MM-DD` (taken as midnight UTC).
pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn extract_publish_date(document: &Html) -> Option<DateTime<Utc>> {
    const META_SOURCES: &[&str] = &[
        "meta[property='article:published_time']",
        "meta[itemprop='datePublished']",
        "meta[name='pubdate']",
        "meta[name='publishdate']",
        "meta[name='date']",
    ];

    META_SOURCES
        .iter()
        .filter_map(|css| first_attr(document, css, "content"))
        .find_map(|raw| parse_publish_date(&raw))
        .or_else(|| {
            json_ld_objects(document)
                .iter()
                .filter_map(|obj| obj.get("datePublished").and_then(|d| d.as_str()))
                .find_map(parse_publish_date)
        })
        .or_else(|| {
            first_attr(document, "time[datetime]", "datetime")
                .and_then(|raw| parse_publish_date(&raw))
        })
}

fn extract_top_image(document: &Html, page_url: &Url) -> Option<String> {
    let candidate = first_attr(document, "meta[property='og:image']", "content")
        .or_else(|| first_attr(document, "meta[name='twitter:image']", "content"))
        .or_else(|| first_attr(document, "link[rel='image_src']", "href"))
        .or_else(|| {
            CONTENT_SELECTORS.iter().find_map(|container| {
                first_attr(document, &format!("{} img", container), "src")
            })
        })?;

    // Relative references resolve against the page
    page_url.join(&candidate).ok().map(|u| u.to_string())
}

fn paragraphs_of(root: &ElementRef<'_>) -> Vec<String> {
    match Selector::parse("p") {
        Ok(p) => root
            .select(&p)
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn extract_text(document: &Html) -> String {
    let from_container = CONTENT_SELECTORS.iter().find_map(|css| {
        select_all(document, css).first().and_then(|container| {
            let paragraphs = paragraphs_of(container);
            let joined_len: usize = paragraphs.iter().map(String::len).sum();
            (joined_len >= MIN_CONTENT_LEN).then_some(paragraphs)
        })
    });

    let paragraphs = match from_container {
        Some(paragraphs) => paragraphs,
        None => {
            tracing::debug!("No content container matched, using all paragraphs");
            paragraphs_of(&document.root_element())
        }
    };

    let kept: Vec<String> = paragraphs
        .into_iter()
        .filter(|p| !is_boilerplate(p))
        .map(|p| clean(&p))
        .collect();
    kept.join("\n\n")
}

/// Paragraphs that are page furniture rather than article body.
fn is_boilerplate(paragraph: &str) -> bool {
    let trimmed = paragraph.trim();
    let lower = trimmed.to_lowercase();

    matches!(
        lower.as_str(),
        "advertisement" | "supported by" | "menu" | "loading comments..." | "share this article"
    ) || lower.starts_with("skip to content")
        || lower.starts_with("sign up for")
        || lower.starts_with("subscribe to our newsletter")
        || lower.contains("proudly powered by wordpress")
        || lower.contains("all rights reserved")
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ExtractionError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(ExtractionError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ExtractionError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ExtractionError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
