//! State module for tracking extraction progress
//!
//! # Components
//!
//! - `AccumulatorStore`: partial records keyed by document identity, shared by
//!   every extraction pass of a run

mod accumulator;

pub use accumulator::{has_data, AccumulatorStore, Record, IDENTITY_FIELD};
