//! Extraction module
//!
//! This module contains the structural extraction logic:
//! - `selector`: CSS selector adapter over parsed documents
//! - `value`: the value-collapse rule for selector output
//! - `engine`: the recursive pass applying a schema group to a document
//! - `completion`: the required-field check deciding when a record is emitted

mod completion;
mod engine;
mod selector;
mod value;

pub use completion::{check, is_complete};
pub use engine::{Extraction, Extractor, FetchRequest, FollowKind, Outcome};
pub use selector::{Document, SelectorExpr};
pub use value::{collapse, collapse_present};

use thiserror::Error;

/// Errors raised while extracting into or settling a record
///
/// None of these abort a run: they are contained to the identity they name.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Required field '{key}' is missing")]
    MissingRequiredField { key: String },

    #[error("No pending record for {identity}")]
    IdentityNotFound { identity: String },

    #[error("Extraction failed for {identity}: {reason}")]
    UnexpectedExtractionFailure { identity: String, reason: String },
}
