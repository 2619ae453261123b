//! Output module for completed records
//!
//! This module handles:
//! - The `RecordSink` interface the coordinator emits records through
//! - Writing records to an append-only JSON array file
//! - In-memory, stdout and log-only sinks
//! - Recording run statistics

mod json_file;
mod memory;
pub mod stats;
mod traits;

pub use json_file::JsonArrayFile;
pub use memory::{MemorySink, NoOutput, StdoutSink};
pub use stats::{log_summary, spawn_periodic_logger, CrawlStats, StatsSnapshot};
pub use traits::{OutputError, OutputResult, RecordSink};

use crate::config::{Destination, OutputConfig};
use std::path::Path;

/// Builds the sink selected by the output configuration
pub fn build_sink(config: &OutputConfig) -> OutputResult<Box<dyn RecordSink>> {
    match config.destination {
        Destination::Local => {
            let file = config.file.as_deref().ok_or_else(|| {
                OutputError::Write("no output file configured".to_string())
            })?;
            Ok(Box::new(JsonArrayFile::open(Path::new(file))?))
        }
        Destination::None => Ok(Box::new(NoOutput)),
    }
}
