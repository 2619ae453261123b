//! Trawl: a declarative structural scraper
//!
//! This crate walks a user-supplied schema tree over fetched HTML documents,
//! extracts fields, lists and repeated elements with CSS selectors, follows
//! list and pagination links, accumulates partial records per document and
//! emits each record once it is complete.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod logging;
pub mod output;
pub mod schema;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Trawl operations
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to load job '{job_id}': {message}")]
    Job { job_id: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while compiling a JSON structure into a schema tree
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid selector '{selector}' at '{path}': {message}")]
    InvalidSelector {
        path: String,
        selector: String,
        message: String,
    },

    #[error("'{path}' is missing its '_element' selector")]
    MissingElement { path: String },

    #[error("Unsupported value at '{path}': expected a selector string or a mapping, got {found}")]
    UnexpectedValue { path: String, found: &'static str },

    #[error("Schema root must be a mapping")]
    RootNotMapping,
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Trawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use extract::{Extraction, Extractor, Outcome};
pub use schema::{Entry, Group, JobDefinition};
pub use state::{AccumulatorStore, Record};
pub use url::canonicalize;
