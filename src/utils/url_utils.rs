//! URL manipulation utilities.
//!
//! This module provides functions for validating targets and resolving
//! links discovered on rendered pages.

use anyhow::Result;
use url::Url;

/// Check if a URL is valid
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    // Skip data URLs, javascript URLs, and other non-http schemes
    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Resolve a possibly-relative `href` against `origin`.
///
/// Returns `None` for hrefs that cannot be resolved or that point at a
/// non-http scheme.
#[must_use]
pub fn resolve_link(origin: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let base = Url::parse(origin).ok()?;
    let joined = base.join(href).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// Last non-empty path segment of a URL (`.../detail/1766385743198` → `1766385743198`).
#[must_use]
pub fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()
        .map(str::to_string)
}

/// Append query pairs to an endpoint, percent-encoding values.
pub fn with_query(endpoint: &str, pairs: &[(&str, &str)]) -> Result<String> {
    let mut url =
        Url::parse(endpoint).map_err(|e| anyhow::anyhow!("Failed to parse URL {endpoint}: {e}"))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}
