//! Schema model
//!
//! This module holds the declarative extraction tree and the job definition it
//! is delivered in:
//! - `node`: the tagged tree (`Group`, `Entry`, loops)
//! - `compile`: turns the JSON structure of a job into that tree
//! - `job`: loads a job by identifier from a config server or a directory

mod compile;
mod job;
mod node;

pub use compile::compile;
pub use job::{load_job, JobDefinition};
pub use node::{
    Entry, FieldKey, Group, LoopField, LoopSpec, NestedLoop, DEFAULT_LOOP_KEY,
    DEFAULT_NESTED_LOOP_KEY, OPTIONAL_MARKER,
};
