//! Full-article extraction for the reader view.
//!
//! [`fetch_article`] downloads the page an item links to and pulls out the
//! title, body, authors, publish date and lead image. [`ArticleCache`]
//! memoizes successful extractions per URL for the rest of the session.

mod cache;
mod extractor;

pub use cache::{ArticleCache, CacheLookup};
pub use extractor::{
    extract_article, fetch_article, parse_publish_date, Article, ExtractionError,
    DEFAULT_ARTICLE_TIMEOUT,
};
