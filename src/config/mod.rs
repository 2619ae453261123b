//! Configuration module for Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! println!("Fetching with concurrency {}", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, Destination, IncompletePolicy, JobConfig, LogConfig, OutputConfig,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
