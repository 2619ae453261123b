//! In-process sinks: memory collection, stdout preview and log-only output

use super::traits::{OutputResult, RecordSink};
use crate::state::Record;
use serde_json::json;
use std::io::{Stdout, Write};
use std::sync::{Arc, Mutex};

/// Collects records in memory
///
/// Clones share the same buffer, so a handle kept by the caller sees the
/// records emitted through the clone given to the coordinator.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record emitted so far
    pub fn records(&self) -> Vec<Record> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RecordSink for MemorySink {
    fn emit(&mut self, record: &Record) -> OutputResult<()> {
        match self.records.lock() {
            Ok(mut records) => records.push(record.clone()),
            Err(poisoned) => poisoned.into_inner().push(record.clone()),
        }
        Ok(())
    }
}

/// Message printed by a preview that found no record
pub const NO_RECORD_HINT: &str = "Request might need additional Cookies";

/// Prints records to stdout as pretty JSON
///
/// If nothing was printed by the time the sink is finished, a single
/// `{"error": ...}` object is written instead so a preview never ends silently.
#[derive(Debug)]
pub struct StdoutSink<W = Stdout> {
    out: W,
    written: bool,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> RecordSink for StdoutSink<W> {
    fn emit(&mut self, record: &Record) -> OutputResult<()> {
        serde_json::to_writer_pretty(&mut self.out, record)?;
        writeln!(self.out)?;
        self.written = true;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if !self.written {
            tracing::warn!("No record was completed, the job may need additional cookies");
            serde_json::to_writer(&mut self.out, &json!({ "error": NO_RECORD_HINT }))?;
            writeln!(self.out)?;
            self.written = true;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Logs records without persisting them
#[derive(Debug, Default)]
pub struct NoOutput;

impl RecordSink for NoOutput {
    fn emit(&mut self, record: &Record) -> OutputResult<()> {
        tracing::info!(
            fields = record.len(),
            "No output destination, dropping record"
        );
        Ok(())
    }
}
