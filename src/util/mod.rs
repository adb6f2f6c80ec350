//! Small helpers shared by the feed, content and UI layers.
//!
//! - **URL checks**: scheme validation for fetches, stricter checks before
//!   handing a link to the browser
//! - **Text**: terminal-safe text and width-aware truncation

mod text;
mod url_validator;

pub use text::{collapse_whitespace, strip_control_chars, truncate_to_width};
pub use url_validator::{parse_http_url, validate_url_for_open, UrlValidationError};

/// Maximum allowed search filter length
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
