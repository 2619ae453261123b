//! Completion checker
//!
//! Evaluates a record against the declared schema shape. The walk is driven by
//! the schema, so fields in the record that the schema does not name never
//! matter. Loops and list-follows are never required.

use super::ExtractError;
use crate::schema::{Entry, Group};
use crate::state::Record;
use serde_json::Value;

/// Returns true if every required field of `group` is present and non-null
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use trawl::extract::is_complete;
/// use trawl::schema::compile;
///
/// let schema = compile(&json!({"title": "h1::text", "price*": ".price::text"})).unwrap();
/// let record = json!({"url": "https://e.com/", "title": "X"});
/// assert!(is_complete(record.as_object().unwrap(), &schema));
/// ```
pub fn is_complete(record: &Record, group: &Group) -> bool {
    check(record, group).is_ok()
}

/// Like [`is_complete`], naming the first unmet required field on failure
pub fn check(record: &Record, group: &Group) -> Result<(), ExtractError> {
    check_at(record, group, "")
}

fn check_at(record: &Record, group: &Group, prefix: &str) -> Result<(), ExtractError> {
    for entry in &group.entries {
        match entry {
            Entry::Field { key, .. } => {
                if key.optional {
                    continue;
                }
                match record.get(&key.name) {
                    Some(value) if !value.is_null() => {}
                    _ => return Err(missing(prefix, &key.name)),
                }
            }
            Entry::Group { key, group } => {
                if key.optional {
                    continue;
                }
                let here = path(prefix, &key.name);
                match record.get(&key.name) {
                    Some(Value::Object(sub)) => check_at(sub, group, &here)?,
                    _ => return Err(ExtractError::MissingRequiredField { key: here }),
                }
            }
            Entry::ListFollow { .. } | Entry::Loop(_) => {}
        }
    }

    Ok(())
}

fn path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn missing(prefix: &str, name: &str) -> ExtractError {
    ExtractError::MissingRequiredField {
        key: path(prefix, name),
    }
}
