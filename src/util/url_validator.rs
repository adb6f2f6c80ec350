use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors from checking a user-supplied URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The string could not be parsed as a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Only http and https are fetched or opened.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// Loopback or private address, refused for browser hand-off.
    #[error("Private address not allowed: {0}")]
    PrivateHost(String),
}

/// Parses a feed or article URL and requires an http(s) scheme with a host.
///
/// Feed URLs are typed by the user, so private and loopback hosts are
/// allowed here (self-hosted feeds are common).
///
/// ```
/// use newsrss::util::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/feed.xml").is_ok());
/// assert!(parse_http_url("file:///etc/passwd").is_err());
/// assert!(parse_http_url("not a url").is_err());
/// ```
pub fn parse_http_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Validates a link before handing it to the system browser.
///
/// Item links come from remote feed content, so on top of
/// [`parse_http_url`] this rejects localhost and private address ranges.
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = parse_http_url(url_str)?;

    if let Some(host) = url.host_str() {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(UrlValidationError::PrivateHost(host.to_owned()));
        }

        let bare = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = bare.parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateHost(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() || v6.is_unspecified() {
                return true;
            }
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link local
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}
