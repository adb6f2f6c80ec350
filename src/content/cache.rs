use crate::content::extractor::{Article, ExtractionError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Result of asking the cache for an article.
#[derive(Debug, Clone)]
pub enum CacheLookup {
    /// Already extracted during this session.
    Hit(Arc<Article>),
    /// Extraction already failed during this session; holds the error text.
    Failed(String),
    /// An extraction for this URL is in flight; do not start another.
    Pending,
    /// Nothing known. The caller now owns the extraction and must report
    /// back through [`ArticleCache::complete`].
    Miss,
}

/// Session-scoped memo of extracted articles keyed by URL.
///
/// Each URL is extracted at most once per session. Outcomes, failed ones
/// included, are kept until the session ends, and concurrent requests for a
/// URL that is already being extracted see [`CacheLookup::Pending`].
#[derive(Debug, Default)]
pub struct ArticleCache {
    entries: HashMap<String, Cached>,
    pending: HashSet<String>,
}

#[derive(Debug, Clone)]
enum Cached {
    Ready(Arc<Article>),
    Failed(String),
}

impl ArticleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks `url` up, marking it pending on a miss.
    pub fn begin(&mut self, url: &str) -> CacheLookup {
        match self.entries.get(url) {
            Some(Cached::Ready(article)) => {
                tracing::debug!(url, "Article cache hit");
                return CacheLookup::Hit(Arc::clone(article));
            }
            Some(Cached::Failed(error)) => {
                tracing::debug!(url, "Article cache hit (failed extraction)");
                return CacheLookup::Failed(error.clone());
            }
            None => {}
        }
        if self.pending.contains(url) {
            return CacheLookup::Pending;
        }
        self.pending.insert(url.to_string());
        CacheLookup::Miss
    }

    /// Records the outcome of an extraction started by [`Self::begin`].
    pub fn complete(
        &mut self,
        url: &str,
        result: Result<Article, ExtractionError>,
    ) -> Result<Arc<Article>, ExtractionError> {
        self.pending.remove(url);
        match result {
            Ok(article) => {
                let article = Arc::new(article);
                self.entries
                    .insert(url.to_string(), Cached::Ready(Arc::clone(&article)));
                Ok(article)
            }
            Err(e) => {
                self.entries
                    .insert(url.to_string(), Cached::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Releases a URL whose extraction never reported back, so it can be
    /// started again.
    pub fn abandon(&mut self, url: &str) {
        self.pending.remove(url);
    }

    pub fn get(&self, url: &str) -> Option<Arc<Article>> {
        match self.entries.get(url) {
            Some(Cached::Ready(article)) => Some(Arc::clone(article)),
            _ => None,
        }
    }

    /// Whether an extraction of `url` already failed this session.
    pub fn has_failed(&self, url: &str) -> bool {
        matches!(self.entries.get(url), Some(Cached::Failed(_)))
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.contains(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops everything. Called when the session ends.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str) -> Article {
        Article {
            url: url.to_string(),
            title: "Title".to_string(),
            text: "Body".to_string(),
            authors: vec![],
            publish_date: None,
            top_image: None,
        }
    }

    #[test]
    fn test_miss_then_pending_then_hit() {
        let mut cache = ArticleCache::new();
        let url = "https://example.com/a";

        assert!(matches!(cache.begin(url), CacheLookup::Miss));
        assert!(cache.is_pending(url));
        assert!(matches!(cache.begin(url), CacheLookup::Pending));

        let stored = cache.complete(url, Ok(article(url))).unwrap();
        assert!(!cache.is_pending(url));
        match cache.begin(url) {
            CacheLookup::Hit(hit) => assert!(Arc::ptr_eq(&hit, &stored)),
            other => panic!("Expected hit, got {:?}", other),
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_memoized() {
        let mut cache = ArticleCache::new();
        let url = "https://example.com/broken";

        assert!(matches!(cache.begin(url), CacheLookup::Miss));
        let result = cache.complete(url, Err(ExtractionError::Empty));
        assert!(result.is_err());
        assert!(cache.has_failed(url));
        assert!(cache.get(url).is_none());
        assert!(!cache.is_pending(url));

        // Reopening shows the same error without extracting again
        match cache.begin(url) {
            CacheLookup::Failed(error) => assert_eq!(error, "No article content found"),
            other => panic!("Expected failed entry, got {:?}", other),
        }
    }

    #[test]
    fn test_abandon_releases_pending_url() {
        let mut cache = ArticleCache::new();
        let url = "https://example.com/a";
        assert!(matches!(cache.begin(url), CacheLookup::Miss));
        cache.abandon(url);
        assert!(!cache.is_pending(url));
        assert!(matches!(cache.begin(url), CacheLookup::Miss));
    }

    #[test]
    fn test_urls_are_independent() {
        let mut cache = ArticleCache::new();
        cache.begin("https://a.example/1");
        cache
            .complete("https://a.example/1", Ok(article("https://a.example/1")))
            .unwrap();

        assert!(cache.get("https://a.example/2").is_none());
        assert!(matches!(cache.begin("https://a.example/2"), CacheLookup::Miss));
    }

    #[test]
    fn test_clear_drops_entries() {
        let mut cache = ArticleCache::new();
        cache.begin("u");
        cache.complete("u", Ok(article("u"))).unwrap();
        cache.begin("v");
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.is_pending("v"));
    }
}
