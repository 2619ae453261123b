//! Record sink trait and output errors

use crate::state::Record;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Receives completed records
///
/// A sink is owned by the coordinator and called from a single task, so
/// records arrive one at a time in completion order. An error stops the run.
pub trait RecordSink: Send {
    /// Persists or publishes one completed record
    fn emit(&mut self, record: &Record) -> OutputResult<()>;

    /// Flushes and closes the sink at the end of a run
    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}
