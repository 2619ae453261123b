//! Extraction engine
//!
//! One pass applies a schema group to a fetched document:
//!
//! 1. Walk the group's entries in declared order, building a partial record
//!    locally and collecting links to follow (pagination, list items)
//! 2. Merge the partial record into the accumulator under the document identity,
//!    check it against the group and pop it if complete, all under the
//!    identity's lock
//!
//! The pass is synchronous; it never waits on the network.

use super::completion::check;
use super::selector::{Document, SelectorExpr};
use super::value::collapse_present;
use super::ExtractError;
use crate::schema::{Entry, FieldKey, Group, LoopField, LoopSpec, NestedLoop};
use crate::state::{has_data, AccumulatorStore, Record};
use scraper::ElementRef;
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

/// Why a link is being followed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowKind {
    /// Next page of the group that found it
    Pagination,
    /// An item matched by a `_list` element selector
    ListItem,
}

/// A document to fetch and the schema group to apply to it
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub schema: Arc<Group>,
    pub kind: FollowKind,
}

/// What happened to the identity's record at the end of a pass
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The record was complete and carried data; it left the store
    Emitted(Record),
    /// The record was complete but held nothing besides its identity
    Discarded,
    /// The record is incomplete (or already settled) and stays as it is
    Pending,
    /// The pass failed; the record keeps its last good state
    Abandoned(String),
}

/// Result of one extraction pass
#[derive(Debug, Clone)]
pub struct Extraction {
    pub follow: Vec<FetchRequest>,
    pub outcome: Outcome,
}

/// Applies schema groups to documents, accumulating into a shared store
#[derive(Debug, Clone)]
pub struct Extractor {
    store: Arc<AccumulatorStore>,
}

impl Extractor {
    pub fn new(store: Arc<AccumulatorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<AccumulatorStore> {
        &self.store
    }

    /// Runs one extraction pass of `schema` over `document` for `identity`
    ///
    /// Links found during the walk are returned even when the pass is
    /// abandoned, since they were discovered before the failure.
    pub fn extract(&self, document: &Document, schema: &Arc<Group>, identity: &str) -> Extraction {
        let mut follow = Vec::new();
        let partial = self.apply_group(document, document.root(), schema, identity, &mut follow);

        let outcome = self.settle(identity, schema, partial);

        Extraction { follow, outcome }
    }

    /// Merges the partial record and pops it if complete, under one lock
    fn settle(&self, identity: &str, schema: &Group, partial: Record) -> Outcome {
        let mut missing = None;
        let popped = self
            .store
            .merge_then_pop_if(identity, partial, |record| match check(record, schema) {
                Ok(()) => true,
                Err(e) => {
                    missing = Some(e);
                    false
                }
            });

        match popped {
            Ok(Some(record)) => {
                if has_data(&record) {
                    tracing::debug!(identity, "Record complete");
                    Outcome::Emitted(record)
                } else {
                    tracing::debug!(identity, "Record complete but empty, discarding");
                    Outcome::Discarded
                }
            }
            Ok(None) => {
                if let Some(reason) = missing {
                    tracing::debug!(identity, %reason, "Record pending");
                }
                Outcome::Pending
            }
            Err(ExtractError::IdentityNotFound { .. }) => Outcome::Pending,
            Err(e) => {
                tracing::error!(identity, error = %e, "Abandoning extraction pass");
                Outcome::Abandoned(e.to_string())
            }
        }
    }

    fn apply_group(
        &self,
        document: &Document,
        scope: ElementRef<'_>,
        group: &Arc<Group>,
        identity: &str,
        follow: &mut Vec<FetchRequest>,
    ) -> Record {
        let mut record = Map::new();

        if let Some(pagination) = &group.pagination {
            if let Some(next) = pagination.query_links(scope, document.url()).into_iter().next() {
                tracing::info!("Following pagination to: {}", next);
                follow.push(FetchRequest {
                    url: next,
                    schema: Arc::clone(group),
                    kind: FollowKind::Pagination,
                });
            }
        }

        for entry in &group.entries {
            match entry {
                Entry::Field { key, selector } => {
                    if let Some(value) = field_value(scope, key, selector, identity) {
                        record.insert(key.name.clone(), value);
                    }
                }
                Entry::Group { key, group: child } => {
                    let sub = self.apply_group(document, scope, child, identity, follow);
                    if !sub.is_empty() {
                        record.insert(key.name.clone(), Value::Object(sub));
                    }
                }
                Entry::ListFollow { element, schema } => {
                    for link in element.query_links(scope, document.url()) {
                        tracing::debug!("Found link: {}", link);
                        follow.push(FetchRequest {
                            url: link,
                            schema: Arc::clone(schema),
                            kind: FollowKind::ListItem,
                        });
                    }
                }
                Entry::Loop(spec) => {
                    let items = apply_loop(scope, spec, identity);
                    record.insert(spec.output_key.clone(), Value::Array(items));
                }
            }
        }

        record
    }
}

fn field_value(
    scope: ElementRef<'_>,
    key: &FieldKey,
    selector: &SelectorExpr,
    identity: &str,
) -> Option<Value> {
    let value = collapse_present(selector.query(scope));
    if value.is_none() && !key.optional {
        tracing::info!(identity, key = %key.name, "Required field not found");
    }
    value
}

fn apply_loop(scope: ElementRef<'_>, spec: &LoopSpec, identity: &str) -> Vec<Value> {
    let mut items = Vec::new();

    for element in spec.element.select(scope) {
        let mut data = Map::new();
        let mut found = false;

        for field in &spec.fields {
            match field {
                LoopField::Field { key, selector } => {
                    if let Some(value) = field_value(element, key, selector, identity) {
                        data.insert(key.name.clone(), value);
                        found = true;
                    }
                }
                LoopField::Nested(nested) => {
                    let sub_items = apply_nested_loop(element, nested);
                    found |= !sub_items.is_empty();
                    data.insert(nested.output_key.clone(), Value::Array(sub_items));
                }
            }
        }

        // an element whose nested loops are all empty yields no data
        if found {
            items.push(Value::Object(data));
        }
    }

    items
}

fn apply_nested_loop(scope: ElementRef<'_>, nested: &NestedLoop) -> Vec<Value> {
    nested
        .element
        .select(scope)
        .into_iter()
        .filter_map(|element| {
            let data: Map<String, Value> = nested
                .fields
                .iter()
                .filter_map(|(key, selector)| {
                    collapse_present(selector.query(element)).map(|v| (key.name.clone(), v))
                })
                .collect();
            (!data.is_empty()).then_some(Value::Object(data))
        })
        .collect()
}
