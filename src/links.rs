//! Link utilities.
//!
//! Pure functions that validate, normalize, split, join and deduplicate the
//! link list of a note, and derive the display domain and favicon of a link.
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use url::Url;

use crate::{NotesError, Result};

/// Separator used when splitting a link list
pub const URL_DELIMITER: char = ',';

/// Separator used when joining a link list
pub const URL_JOINER: &str = ", ";

/// Returned by [`extract_domain`] when the input cannot be parsed
pub const UNKNOWN_DOMAIN: &str = "unknown";

const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";

static HTTP_URL: OnceLock<Regex> = OnceLock::new();

fn http_url_pattern() -> &'static Regex {
    HTTP_URL.get_or_init(|| Regex::new(r"(?i)^https?://\S+$").expect("valid URL pattern"))
}

/// Returns true iff `s` is an absolute http(s) URL with a host.
///
/// Bare domains, other schemes, surrounding whitespace and the empty string
/// are all rejected.
pub fn is_valid_url(s: &str) -> bool {
    if !http_url_pattern().is_match(s) {
        return false;
    }

    match Url::parse(s) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

/// Canonical form of a URL, used for equality-based deduplication.
///
/// Scheme and host are lower-cased, default ports dropped and trailing
/// slashes removed when there is no query or fragment. Input that is not a
/// valid URL comes back trimmed but otherwise untouched. Idempotent.
pub fn normalize_url(s: &str) -> String {
    let trimmed = s.trim();
    if !is_valid_url(trimmed) {
        return trimmed.to_string();
    }

    match Url::parse(trimmed) {
        Ok(url) if url.query().is_none() && url.fragment().is_none() => {
            url.as_str().trim_end_matches('/').to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Splits a delimiter-joined link list, trimming segments and dropping empty ones
pub fn parse_urls(joined: &str) -> Vec<String> {
    joined
        .split(URL_DELIMITER)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Inverse of [`parse_urls`]
pub fn join_urls<S: AsRef<str>>(urls: &[S]) -> String {
    urls.iter()
        .map(|u| u.as_ref())
        .collect::<Vec<_>>()
        .join(URL_JOINER)
}

/// True when `urls` already holds a URL equal to `url` after normalization
pub fn contains_url<S: AsRef<str>>(urls: &[S], url: &str) -> bool {
    let wanted = normalize_url(url);
    urls.iter().any(|u| normalize_url(u.as_ref()) == wanted)
}

/// Appends `new_url` unless an equal (normalized) URL is already present
pub fn add_url_to_urls<S: AsRef<str>>(urls: &[S], new_url: &str) -> Vec<String> {
    let mut result: Vec<String> = urls.iter().map(|u| u.as_ref().to_string()).collect();
    if contains_url(urls, new_url) {
        debug!("Link already present, not adding: {}", new_url);
    } else {
        result.push(new_url.to_string());
    }
    result
}

/// Host component of a URL, or [`UNKNOWN_DOMAIN`]
pub fn extract_domain(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

/// Favicon URL for the domain of `url`
pub fn get_favicon_url(url: &str) -> String {
    format!("{}?domain={}&sz=32", FAVICON_SERVICE, extract_domain(url))
}

/// Validates a link list typed by the user.
///
/// Every segment must be valid; otherwise nothing is accepted and the error
/// names the offending segments.
pub fn validate_link_input(value: &str) -> Result<Vec<String>> {
    let urls = parse_urls(value);
    let invalid: Vec<String> = urls.iter().filter(|u| !is_valid_url(u)).cloned().collect();

    if invalid.is_empty() {
        Ok(urls)
    } else {
        Err(NotesError::InvalidUrls { segments: invalid })
    }
}
