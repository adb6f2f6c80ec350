//! RSS feed retrieval and item selection.
//!
//! - [`parser`] - XML bytes to a nested element tree mirroring the tags
//! - [`fetcher`] - HTTP retrieval with timeout and size limits
//! - [`items`] - `rss → channel → item` walking, image resolution, filtering
//!
//! # Example
//!
//! ```ignore
//! use newsrss::feed::{fetch_feed, collect_items, DEFAULT_FEED_TIMEOUT};
//!
//! let doc = fetch_feed(&client, "https://example.com/rss", DEFAULT_FEED_TIMEOUT).await?;
//! let items = collect_items(&doc, "rust")?;
//! ```

mod fetcher;
mod items;
mod parser;

pub use fetcher::{
    fetch_feed, load_all, load_section, FeedSection, FetchError, DEFAULT_FEED_TIMEOUT,
};
pub use items::{
    collect_items, extract_items, filter_items, first_image_src, item_from_node, resolve_image,
    FeedItem, ImageSource, IMAGE_SOURCES, MIN_DESCRIPTION_LEN,
};
pub use parser::{parse_document, XmlError, XmlNode};
