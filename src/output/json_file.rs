//! Append-only JSON array file
//!
//! Records are written as one JSON object per line inside a single array. An
//! existing non-empty file is reopened by removing its closing bracket, so
//! successive runs keep extending the same array.

use super::traits::{OutputError, OutputResult, RecordSink};
use crate::state::Record;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct JsonArrayFile {
    path: PathBuf,
    file: File,
    first_item: bool,
    finished: bool,
}

impl JsonArrayFile {
    /// Opens `path`, creating the array or reopening an existing one
    pub fn open(path: &Path) -> OutputResult<Self> {
        let existing = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let (content, first_item) = if existing.trim().is_empty() {
            ("[".to_string(), true)
        } else {
            reopen_array(&existing).ok_or_else(|| {
                OutputError::Format(format!(
                    "{} does not hold a JSON array",
                    path.display()
                ))
            })?
        };

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        tracing::debug!("Writing records to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            file,
            first_item,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Strips the closing bracket (and a dangling comma) of a previous run
///
/// Returns the content to continue from and whether it still has no item.
fn reopen_array(existing: &str) -> Option<(String, bool)> {
    let mut content = existing.trim();
    if !content.starts_with('[') {
        return None;
    }

    if let Some(open) = content.strip_suffix(']') {
        content = open.trim_end();
    }
    if let Some(open) = content.strip_suffix(',') {
        content = open.trim_end();
    }

    let first_item = content == "[";
    Some((content.to_string(), first_item))
}

impl RecordSink for JsonArrayFile {
    fn emit(&mut self, record: &Record) -> OutputResult<()> {
        if self.finished {
            return Err(OutputError::Write(format!(
                "{} is already closed",
                self.path.display()
            )));
        }

        if self.first_item {
            self.first_item = false;
        } else {
            self.file.write_all(b",\n")?;
        }

        let line = serde_json::to_string(record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if !self.finished {
            self.file.write_all(b"]")?;
            self.file.flush()?;
            self.finished = true;
        }
        Ok(())
    }
}
