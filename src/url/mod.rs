//! URL handling for Strata-Crawl
//!
//! Record identity is the canonical profile URL, so every profile link goes
//! through [`canonicalize_url`] before it is compared against the checkpoint.
//! Listing links are resolved with [`resolve_href`].

use crate::UrlError;
use url::Url;

/// Query parameters that never change which profile a URL points at
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Produces the canonical form of a URL, used as a record key
///
/// # Canonicalization Steps
///
/// 1. Parse; reject anything that is not http or https
/// 2. Lowercase the host
/// 3. Collapse empty and dot path segments, drop a trailing slash (except root)
/// 4. Drop the fragment
/// 5. Drop tracking query parameters, sort the rest, drop an empty query
///
/// Unlike a crawler frontier, the scheme and a `www.` prefix are preserved:
/// a key must round-trip to the page it was read from.
///
/// # Examples
///
/// ```
/// use strata_crawl::url::canonicalize_url;
///
/// let url = canonicalize_url("https://EXAMPLE.com/Ohio//Doe-John.html#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/Ohio/Doe-John.html");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = collapse_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Resolves an `href` against the page it appeared on
///
/// Returns None for empty hrefs, same-page anchors, non-navigational schemes
/// (`javascript:`, `mailto:`, `tel:`, `data:`) and anything that does not
/// resolve to an http(s) URL.
pub fn resolve_href(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = base_url.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}

fn collapse_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
