//! Crawler module: the dispatch loop around the extraction engine
//!
//! This module contains:
//! - HTTP fetching with proxy rotation and retry logic
//! - The frontier queue and concurrency limit
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{run_job, Coordinator};
pub use fetcher::{build_http_client, FetchResult, Fetcher};
pub use scheduler::{FetchTask, Frontier, ScheduledFetch};
