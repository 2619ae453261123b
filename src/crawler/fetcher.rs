//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured headers and proxies
//! - Rotating proxies round-robin across requests
//! - Sending job cookies with every request
//! - Retry logic for transient failures

use crate::config::CrawlerConfig;
use crate::{ConfigError, TrawlError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::{Client, Proxy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// The server answered with a non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

/// Builds an HTTP client with the configured headers, cookies and proxy
///
/// # Example
///
/// ```
/// use trawl::config::CrawlerConfig;
/// use trawl::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default(), &[], None).unwrap();
/// ```
pub fn build_http_client(
    config: &CrawlerConfig,
    cookies: &[(String, String)],
    proxy: Option<&str>,
) -> Result<Client, TrawlError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::Validation(format!("Invalid header '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            ConfigError::Validation(format!("Invalid value for header '{}': {}", name, e))
        })?;
        headers.insert(name, value);
    }

    if let Some(cookie) = cookie_header(cookies) {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| ConfigError::Validation(format!("Invalid cookie: {}", e)))?;
        headers.insert(COOKIE, value);
    }

    let mut builder = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout))
        .connect_timeout(Duration::from_secs(config.request_timeout.min(10)))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    Ok(builder.build()?)
}

fn cookie_header(cookies: &[(String, String)]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Fetches documents through a rotating set of clients
pub struct Fetcher {
    clients: Vec<Client>,
    next_client: AtomicUsize,
    max_retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    /// Builds one client per configured proxy, or a single direct client
    pub fn new(config: &CrawlerConfig, cookies: &[(String, String)]) -> Result<Self, TrawlError> {
        let clients = if config.proxies.is_empty() {
            vec![build_http_client(config, cookies, None)?]
        } else {
            config
                .proxies
                .iter()
                .map(|proxy| build_http_client(config, cookies, Some(proxy)))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            clients,
            next_client: AtomicUsize::new(0),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay),
        })
    }

    fn client(&self) -> &Client {
        let index = self.next_client.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }

    /// Fetches a URL with retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Success |
    /// | HTTP 5xx | Retry up to `max-retries` times |
    /// | Timeout / connection failure | Retry up to `max-retries` times |
    /// | Other HTTP status | Immediate HttpError |
    /// | Other request error | Immediate NetworkError |
    ///
    /// Each attempt takes the next client in the rotation.
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let mut attempt = 0;

        loop {
            let retries_left = attempt < self.max_retries;
            attempt += 1;

            match self.client().get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_server_error() && retries_left {
                        tracing::debug!("HTTP {} for {}, retrying (attempt {})", status, url, attempt);
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }

                    if !status.is_success() {
                        return FetchResult::HttpError {
                            status_code: status.as_u16(),
                        };
                    }

                    let final_url = response.url().clone();
                    return match response.text().await {
                        Ok(body) => FetchResult::Success {
                            final_url,
                            status_code: status.as_u16(),
                            body,
                        },
                        Err(e) => FetchResult::NetworkError {
                            error: e.to_string(),
                        },
                    };
                }
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && retries_left {
                        tracing::debug!("{} for {}, retrying (attempt {})", e, url, attempt);
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }

                    let error = if e.is_timeout() {
                        "Request timeout".to_string()
                    } else if e.is_connect() {
                        "Connection refused".to_string()
                    } else {
                        e.to_string()
                    };
                    return FetchResult::NetworkError { error };
                }
            }
        }
    }
}
