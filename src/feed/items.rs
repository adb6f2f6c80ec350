//! Turning a parsed feed document into displayable items.
//!
//! Items are extracted from `rss → channel → item`, their illustrative image
//! is resolved through an ordered list of [`ImageSource`] strategies, thin
//! items are dropped and the optional search filter is applied.

use crate::feed::fetcher::FetchError;
use crate::feed::parser::XmlNode;
use crate::util::{collapse_whitespace, strip_control_chars};
use scraper::{Html, Selector};

/// Descriptions shorter than this many characters are too thin to show.
pub const MIN_DESCRIPTION_LEN: usize = 20;

const DEFAULT_TITLE: &str = "No Title Available";
const DEFAULT_LINK: &str = "#";

/// One displayable entry of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    /// Raw description as published; may contain HTML.
    pub description: String,
    pub link: String,
    pub image_url: Option<String>,
}

impl FeedItem {
    /// Whether the description is long enough to be shown.
    pub fn is_displayable(&self) -> bool {
        self.description.chars().count() >= MIN_DESCRIPTION_LEN
    }

    /// Case-insensitive substring match against title or description.
    ///
    /// `needle` must already be lowercase.
    fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }

    /// Description with HTML removed, whitespace collapsed and control
    /// characters stripped, ready for the terminal.
    pub fn plain_description(&self) -> String {
        let fragment = Html::parse_fragment(&self.description);
        let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
        strip_control_chars(&collapse_whitespace(&text)).into_owned()
    }

    /// The link, if it is something other than the `#` placeholder.
    pub fn article_url(&self) -> Option<&str> {
        let link = self.link.trim();
        (!link.is_empty() && link != DEFAULT_LINK).then_some(link)
    }
}

/// Places an item's illustrative image can come from, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// `<enclosure url="...">`
    Enclosure,
    /// `<media:content url="...">`
    MediaContent,
    /// `src` of the first `<img>` inside the HTML description.
    DescriptionImage,
}

/// Resolution order: the first strategy yielding a non-empty URL wins.
pub const IMAGE_SOURCES: [ImageSource; 3] = [
    ImageSource::Enclosure,
    ImageSource::MediaContent,
    ImageSource::DescriptionImage,
];

impl ImageSource {
    pub fn resolve(self, item: &XmlNode) -> Option<String> {
        let url = match self {
            ImageSource::Enclosure => item.child("enclosure").and_then(|e| e.attr("url")),
            ImageSource::MediaContent => item
                .children_named("media:content")
                .find_map(|m| m.attr("url").filter(|u| !u.trim().is_empty())),
            ImageSource::DescriptionImage => {
                return item
                    .child_text("description")
                    .and_then(first_image_src)
            }
        };
        url.map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
    }
}

/// Runs the [`IMAGE_SOURCES`] chain against one `<item>` element.
pub fn resolve_image(item: &XmlNode) -> Option<String> {
    IMAGE_SOURCES.iter().find_map(|source| source.resolve(item))
}

/// `src` attribute of the first `<img>` tag in an HTML fragment.
pub fn first_image_src(html: &str) -> Option<String> {
    let selector = Selector::parse("img").ok()?;
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

/// Builds a [`FeedItem`] from one `<item>` element.
pub fn item_from_node(node: &XmlNode) -> FeedItem {
    let title = node
        .child_text("title")
        .map(|t| strip_control_chars(t.trim()).into_owned())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let description = node.child_text("description").unwrap_or_default().to_string();
    let link = node
        .child_text("link")
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LINK)
        .to_string();

    FeedItem {
        title,
        description,
        link,
        image_url: resolve_image(node),
    }
}

/// Applies the display policy: thin items are always dropped, and a
/// non-blank `filter` keeps only items whose title or description contains
/// it, ignoring case.
pub fn filter_items<'a>(items: &'a [FeedItem], filter: &str) -> Vec<&'a FeedItem> {
    let needle = filter.trim().to_lowercase();
    items
        .iter()
        .filter(|item| item.is_displayable())
        .filter(|item| needle.is_empty() || item.matches_lowercase(&needle))
        .collect()
}

/// Walks the parsed feed and returns every `<item>` as a [`FeedItem`],
/// unfiltered. Fails with a format error when `rss`, `channel` or `item`
/// is missing.
pub fn extract_items(doc: &XmlNode) -> Result<Vec<FeedItem>, FetchError> {
    if doc.name != "rss" {
        return Err(FetchError::MissingElement("rss"));
    }
    let channel = doc
        .child("channel")
        .ok_or(FetchError::MissingElement("channel"))?;

    let items: Vec<FeedItem> = channel.children_named("item").map(item_from_node).collect();
    if items.is_empty() {
        return Err(FetchError::MissingElement("item"));
    }
    Ok(items)
}

/// Extracts items and applies [`filter_items`] in one step.
pub fn collect_items(doc: &XmlNode, filter: &str) -> Result<Vec<FeedItem>, FetchError> {
    let items = extract_items(doc)?;
    Ok(filter_items(&items, filter).into_iter().cloned().collect())
}
