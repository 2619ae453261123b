//! URL handling module for Trawl
//!
//! This module provides document identity canonicalization and link resolution
//! for link-producing selectors.

mod canonical;

use url::Url;

pub use canonical::{canonicalize, canonicalize_url};

/// Resolves a link href against the document URL and validates it
///
/// Returns None if the link should be excluded:
/// - empty hrefs and fragment-only links (same page anchors)
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use trawl::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/list/page").unwrap();
/// let link = resolve_link("../item/7", &base).unwrap();
/// assert_eq!(link.as_str(), "https://example.com/item/7");
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
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

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
