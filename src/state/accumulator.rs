//! Process-wide store of in-progress records keyed by document identity
//!
//! Every operation locks only the shard holding the identity, so passes over
//! different identities proceed independently while passes over the same
//! identity are serialized.

use crate::extract::ExtractError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{Map, Value};

/// Field holding the identity inside every record
pub const IDENTITY_FIELD: &str = "url";

/// Accumulating mapping of extracted fields for one identity
pub type Record = Map<String, Value>;

/// Concurrent accumulator of partial records
#[derive(Debug, Default)]
pub struct AccumulatorStore {
    records: DashMap<String, Record>,
}

impl AccumulatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `partial` into the record for `identity`, creating it if needed
    ///
    /// New keys are inserted and existing keys are overwritten, except that two
    /// mappings merge recursively. A merge that would swap a mapping for a
    /// non-mapping (or the reverse) fails and leaves the record untouched.
    pub fn merge(&self, identity: &str, partial: Record) -> Result<(), ExtractError> {
        let mut record = self
            .records
            .entry(identity.to_string())
            .or_insert_with(|| new_record(identity));

        if let Some(path) = conflict(&record, &partial, "") {
            return Err(shape_conflict(identity, &path));
        }

        merge_into(&mut record, partial);
        Ok(())
    }

    /// Removes and returns the record if `predicate` holds for it
    ///
    /// The predicate runs under the identity's lock, so no other pass can
    /// mutate the record between the check and the removal.
    pub fn pop_if<F>(&self, identity: &str, predicate: F) -> Result<Option<Record>, ExtractError>
    where
        F: FnOnce(&Record) -> bool,
    {
        match self.records.entry(identity.to_string()) {
            Entry::Occupied(entry) => {
                if predicate(entry.get()) {
                    Ok(Some(entry.remove()))
                } else {
                    Ok(None)
                }
            }
            Entry::Vacant(_) => Err(ExtractError::IdentityNotFound {
                identity: identity.to_string(),
            }),
        }
    }

    /// Merges `partial` and pops the result if `predicate` holds, in one step
    ///
    /// The merge, the predicate and the removal all run under the identity's
    /// lock, so a pass over one identity is a single critical section. Merge
    /// rules and shape conflicts are as for [`merge`](Self::merge).
    pub fn merge_then_pop_if<F>(
        &self,
        identity: &str,
        partial: Record,
        predicate: F,
    ) -> Result<Option<Record>, ExtractError>
    where
        F: FnOnce(&Record) -> bool,
    {
        match self.records.entry(identity.to_string()) {
            Entry::Occupied(mut entry) => {
                if let Some(path) = conflict(entry.get(), &partial, "") {
                    return Err(shape_conflict(identity, &path));
                }
                merge_into(entry.get_mut(), partial);

                if predicate(entry.get()) {
                    Ok(Some(entry.remove()))
                } else {
                    Ok(None)
                }
            }
            Entry::Vacant(entry) => {
                let mut record = new_record(identity);
                merge_into(&mut record, partial);

                if predicate(&record) {
                    Ok(Some(record))
                } else {
                    entry.insert(record);
                    Ok(None)
                }
            }
        }
    }

    /// Removes the record for `identity` unconditionally
    pub fn pop(&self, identity: &str) -> Option<Record> {
        self.records.remove(identity).map(|(_, record)| record)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.records.contains_key(identity)
    }

    /// Returns a copy of the record for `identity`
    pub fn snapshot(&self, identity: &str) -> Option<Record> {
        self.records.get(identity).map(|record| record.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Removes every record, returning them sorted by identity
    pub fn drain(&self) -> Vec<(String, Record)> {
        let identities: Vec<String> = self.records.iter().map(|e| e.key().clone()).collect();

        let mut drained: Vec<(String, Record)> = identities
            .into_iter()
            .filter_map(|identity| self.records.remove(&identity))
            .collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained
    }
}

/// Returns true if the record carries any field besides its identity
pub fn has_data(record: &Record) -> bool {
    record.keys().any(|key| key != IDENTITY_FIELD)
}

fn new_record(identity: &str) -> Record {
    let mut record = Map::new();
    record.insert(
        IDENTITY_FIELD.to_string(),
        Value::String(identity.to_string()),
    );
    record
}

fn shape_conflict(identity: &str, path: &str) -> ExtractError {
    ExtractError::UnexpectedExtractionFailure {
        identity: identity.to_string(),
        reason: format!("'{}' changes shape between passes", path),
    }
}

fn conflict(existing: &Record, incoming: &Record, prefix: &str) -> Option<String> {
    for (key, value) in incoming {
        let Some(current) = existing.get(key) else {
            continue;
        };
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match (current, value) {
            (Value::Object(current), Value::Object(value)) => {
                if let Some(found) = conflict(current, value, &path) {
                    return Some(found);
                }
            }
            (Value::Object(_), _) | (_, Value::Object(_)) => return Some(path),
            _ => {}
        }
    }
    None
}

fn merge_into(target: &mut Record, partial: Record) {
    for (key, value) in partial {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(current)), Value::Object(value)) => merge_into(current, value),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_merge_creates_record_with_identity() {
        let store = AccumulatorStore::new();
        store
            .merge("https://e.com/1", record(json!({"title": "A"})))
            .unwrap();

        assert!(store.contains("https://e.com/1"));
        assert_eq!(
            Value::Object(store.snapshot("https://e.com/1").unwrap()),
            json!({"url": "https://e.com/1", "title": "A"})
        );
    }

    #[test]
    fn test_merge_is_additive_and_recursive() {
        let store = AccumulatorStore::new();
        let id = "https://e.com/1";
        store
            .merge(id, record(json!({"seller": {"name": "Ann"}, "title": "A"})))
            .unwrap();
        store
            .merge(id, record(json!({"seller": {"city": "Oslo"}, "title": "B"})))
            .unwrap();

        assert_eq!(
            Value::Object(store.snapshot(id).unwrap()),
            json!({"url": id, "seller": {"name": "Ann", "city": "Oslo"}, "title": "B"})
        );
    }

    #[test]
    fn test_shape_conflict_leaves_record_untouched() {
        let store = AccumulatorStore::new();
        let id = "https://e.com/1";
        store
            .merge(id, record(json!({"seller": {"name": "Ann"}})))
            .unwrap();

        let err = store
            .merge(id, record(json!({"title": "new", "seller": "flat"})))
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnexpectedExtractionFailure { .. }));
        assert_eq!(
            Value::Object(store.snapshot(id).unwrap()),
            json!({"url": id, "seller": {"name": "Ann"}})
        );
    }

    #[test]
    fn test_pop_if() {
        let store = AccumulatorStore::new();
        let id = "https://e.com/1";
        store.merge(id, Record::new()).unwrap();

        assert_eq!(store.pop_if(id, |_| false).unwrap(), None);
        assert!(store.contains(id));

        let popped = store.pop_if(id, |_| true).unwrap().unwrap();
        assert!(!has_data(&popped));
        assert!(!store.contains(id));

        assert!(matches!(
            store.pop_if(id, |_| true),
            Err(ExtractError::IdentityNotFound { .. })
        ));
    }

    #[test]
    fn test_merge_then_pop_if() {
        let store = AccumulatorStore::new();
        let id = "https://e.com/1";

        let kept = store
            .merge_then_pop_if(id, record(json!({"title": "A"})), |r| r.contains_key("price"))
            .unwrap();
        assert_eq!(kept, None);
        assert!(store.contains(id));

        let popped = store
            .merge_then_pop_if(id, record(json!({"price": "3"})), |r| r.contains_key("price"))
            .unwrap()
            .unwrap();
        assert_eq!(
            Value::Object(popped),
            json!({"url": id, "title": "A", "price": "3"})
        );
        assert!(!store.contains(id));
    }

    #[test]
    fn test_merge_then_pop_if_new_identity_never_stored_when_done() {
        let store = AccumulatorStore::new();
        let popped = store
            .merge_then_pop_if("https://e.com/2", Record::new(), |_| true)
            .unwrap();
        assert!(popped.is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_merge_then_pop_if_conflict_keeps_record() {
        let store = AccumulatorStore::new();
        let id = "https://e.com/1";
        store
            .merge(id, record(json!({"seller": {"name": "Ann"}})))
            .unwrap();

        let err = store
            .merge_then_pop_if(id, record(json!({"seller": "flat"})), |_| true)
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnexpectedExtractionFailure { .. }));
        assert_eq!(
            Value::Object(store.snapshot(id).unwrap()),
            json!({"url": id, "seller": {"name": "Ann"}})
        );
    }

    #[test]
    fn test_drain_sorted() {
        let store = AccumulatorStore::new();
        store.merge("https://e.com/b", Record::new()).unwrap();
        store.merge("https://e.com/a", Record::new()).unwrap();

        let drained: Vec<String> = store.drain().into_iter().map(|(id, _)| id).collect();
        assert_eq!(drained, vec!["https://e.com/a", "https://e.com/b"]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_merges_on_one_identity_lose_nothing() {
        let store = Arc::new(AccumulatorStore::new());
        let id = "https://e.com/shared";

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let mut partial = Record::new();
                        partial.insert(format!("f{}_{}", i, j), json!(j));
                        store.merge(id, partial).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.snapshot(id).unwrap().len(), 8 * 50 + 1);
    }
}
