use crate::UrlError;
use url::Url;

/// Canonicalizes a document URL into the identity used by the accumulator
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only HTTP and HTTPS schemes
/// 3. Require a host (the `url` crate lowercases it and resolves dot segments)
/// 4. Remove the fragment (everything after #)
/// 5. Remove an empty query string (trailing ?)
///
/// Query parameters keep their order: two URLs that differ only in parameter
/// order are distinct documents.
///
/// # Examples
///
/// ```
/// use trawl::url::canonicalize;
///
/// let url = canonicalize("https://EXAMPLE.com/a/../page?#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn canonicalize(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize_url(url)
}

/// Same as [`canonicalize`] for an already parsed URL
pub fn canonicalize_url(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}
