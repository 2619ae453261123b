use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Trawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub job: JobConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of fetches in flight
    pub concurrency: u32,

    /// Per-request timeout (seconds)
    pub request_timeout: u64,

    /// Retries for 5xx responses, timeouts and connection failures
    pub max_retries: u32,

    /// Delay between retries (milliseconds)
    pub retry_delay: u64,

    /// Interval between progress log lines (seconds)
    pub stats_interval: u64,

    /// What to do with records still incomplete when the run ends
    pub on_incomplete: IncompletePolicy,

    /// Proxies rotated round-robin across requests
    pub proxies: Vec<String>,

    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            request_timeout: 30,
            max_retries: 2,
            retry_delay: 500,
            stats_interval: 10,
            on_incomplete: IncompletePolicy::Discard,
            proxies: Vec::new(),
            headers: default_headers(),
        }
    }
}

/// Policy for records that never became complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncompletePolicy {
    /// Log and drop them
    Discard,
    /// Log them and emit those carrying any data
    Emit,
}

/// Where the job definition comes from
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobConfig {
    /// Config server serving `GET {server-url}/config/{job-id}`
    pub server_url: Option<String>,

    /// Directory holding `{job-id}.json` files
    pub directory: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub destination: Destination,

    /// Path to the JSON array file (required for `local`)
    pub file: Option<String>,
}

/// Output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    /// Append records to a JSON array file
    Local,
    /// Only log records
    None,
}

fn default_headers() -> BTreeMap<String, String> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; rv:109.0) Gecko/20100101 Firefox/115.0",
        ),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Upgrade-Insecure-Requests", "1"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "same-origin"),
        ("Sec-Fetch-User", "?1"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Per-job log file settings
///
/// Log lines are also written to `{directory}/{host}/{job-id}/log.log`, rotated
/// by size.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LogConfig {
    /// Write the per-job log file at all
    pub enabled: bool,

    /// Root directory of the log tree
    pub directory: String,

    /// Size at which the file is rotated (bytes)
    pub max_file_size: u64,

    /// Rotated files kept next to the live one
    pub max_files: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "logs".to_string(),
            max_file_size: 10 * 1024 * 1024,
            max_files: 10,
        }
    }
}
