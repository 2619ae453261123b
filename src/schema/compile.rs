//! Compiles a JSON structure into a [`Group`] tree

use super::node::{
    Entry, FieldKey, Group, LoopField, LoopSpec, NestedLoop, DEFAULT_LOOP_KEY,
    DEFAULT_NESTED_LOOP_KEY,
};
use crate::extract::SelectorExpr;
use crate::SchemaError;
use serde_json::{Map, Value};
use std::sync::Arc;

const LIST_KEY: &str = "_list";
const LOOP_KEY: &str = "_loop";
const ELEMENT_KEY: &str = "_element";
const OUTPUT_KEY: &str = "_key";
const PAGINATION_KEY: &str = "_pagination";

/// Compiles the `structure` value of a job definition
///
/// # Key conventions
///
/// | Key | Meaning |
/// |-----|---------|
/// | `name` / `name*` | required / optional field (string) or nested group (mapping) |
/// | `_list` | `{"_element": links, ...}` follow every link with the remaining keys |
/// | `_loop` | `{"_element": items, "_key": out, ...}` one record per item |
/// | `_pagination` | next-page link, re-applies the enclosing mapping |
/// | other `_x` / `@x` | reserved, ignored |
///
/// A `_pagination` written inside a `_list` or `_loop` descriptor, or inside a
/// nested group, belongs to the mapping that holds it.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use trawl::schema::compile;
///
/// let schema = compile(&json!({
///     "title": "h1::text",
///     "price*": "span.price::text"
/// }))
/// .unwrap();
/// assert_eq!(schema.entries.len(), 2);
/// ```
pub fn compile(structure: &Value) -> Result<Arc<Group>, SchemaError> {
    let map = structure.as_object().ok_or(SchemaError::RootNotMapping)?;
    Ok(Arc::new(compile_group(map, "structure")?))
}

fn compile_group(map: &Map<String, Value>, path: &str) -> Result<Group, SchemaError> {
    let mut group = Group::default();

    for (key, value) in map {
        let here = format!("{}.{}", path, key);

        match key.as_str() {
            PAGINATION_KEY => {
                group.pagination = Some(selector(value, &here)?);
            }
            LIST_KEY => {
                let descriptor = descriptor(value, &here)?;
                let element = element(descriptor, &here)?;

                let mut schema = compile_group(descriptor, &here)?;
                if let Some(pagination) = schema.pagination.take() {
                    group.pagination = Some(pagination);
                }

                group.entries.push(Entry::ListFollow {
                    element,
                    schema: Arc::new(schema),
                });
            }
            LOOP_KEY => {
                let descriptor = descriptor(value, &here)?;
                if let Some(pagination) = descriptor.get(PAGINATION_KEY) {
                    group.pagination = Some(selector(pagination, &here)?);
                }
                group.entries.push(Entry::Loop(compile_loop(descriptor, &here)?));
            }
            reserved if is_reserved(reserved) => {
                tracing::trace!("Ignoring reserved key '{}'", here);
            }
            _ => {
                let field_key = FieldKey::parse(key);
                match value {
                    Value::String(_) => group.entries.push(Entry::Field {
                        key: field_key,
                        selector: selector(value, &here)?,
                    }),
                    Value::Object(nested) => {
                        let mut child = compile_group(nested, &here)?;
                        if let Some(pagination) = child.pagination.take() {
                            group.pagination = Some(pagination);
                        }
                        group.entries.push(Entry::Group {
                            key: field_key,
                            group: Arc::new(child),
                        });
                    }
                    other => {
                        return Err(SchemaError::UnexpectedValue {
                            path: here,
                            found: kind(other),
                        })
                    }
                }
            }
        }
    }

    Ok(group)
}

fn compile_loop(descriptor: &Map<String, Value>, path: &str) -> Result<LoopSpec, SchemaError> {
    let mut fields = Vec::new();

    for (key, value) in descriptor {
        if is_reserved(key) {
            continue;
        }

        let here = format!("{}.{}", path, key);
        match value {
            Value::String(_) => fields.push(LoopField::Field {
                key: FieldKey::parse(key),
                selector: selector(value, &here)?,
            }),
            Value::Object(nested) => fields.push(LoopField::Nested(compile_nested_loop(
                nested, &here,
            )?)),
            other => {
                return Err(SchemaError::UnexpectedValue {
                    path: here,
                    found: kind(other),
                })
            }
        }
    }

    Ok(LoopSpec {
        element: element(descriptor, path)?,
        output_key: output_key(descriptor, DEFAULT_LOOP_KEY),
        fields,
    })
}

fn compile_nested_loop(
    descriptor: &Map<String, Value>,
    path: &str,
) -> Result<NestedLoop, SchemaError> {
    let mut fields = Vec::new();

    for (key, value) in descriptor {
        if is_reserved(key) {
            continue;
        }
        let here = format!("{}.{}", path, key);
        fields.push((FieldKey::parse(key), selector(value, &here)?));
    }

    Ok(NestedLoop {
        element: element(descriptor, path)?,
        output_key: output_key(descriptor, DEFAULT_NESTED_LOOP_KEY),
        fields,
    })
}

fn is_reserved(key: &str) -> bool {
    key.starts_with('_') || key.starts_with('@')
}

fn descriptor<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| SchemaError::UnexpectedValue {
        path: path.to_string(),
        found: kind(value),
    })
}

fn element(descriptor: &Map<String, Value>, path: &str) -> Result<SelectorExpr, SchemaError> {
    match descriptor.get(ELEMENT_KEY) {
        Some(value) => selector(value, &format!("{}.{}", path, ELEMENT_KEY)),
        None => Err(SchemaError::MissingElement {
            path: path.to_string(),
        }),
    }
}

fn output_key(descriptor: &Map<String, Value>, default: &str) -> String {
    descriptor
        .get(OUTPUT_KEY)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn selector(value: &Value, path: &str) -> Result<SelectorExpr, SchemaError> {
    let raw = value.as_str().ok_or_else(|| SchemaError::UnexpectedValue {
        path: path.to_string(),
        found: kind(value),
    })?;

    SelectorExpr::parse(raw).map_err(|message| SchemaError::InvalidSelector {
        path: path.to_string(),
        selector: raw.to_string(),
        message,
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fields_keep_declared_order() {
        let schema = compile(&json!({
            "zeta": "h2::text",
            "alpha*": "h1::text",
        }))
        .unwrap();

        let names: Vec<(&str, bool)> = schema
            .entries
            .iter()
            .map(|entry| match entry {
                Entry::Field { key, .. } => (key.name.as_str(), key.optional),
                _ => panic!("expected a field"),
            })
            .collect();
        assert_eq!(names, vec![("zeta", false), ("alpha", true)]);
    }

    #[test]
    fn test_list_descriptor() {
        let schema = compile(&json!({
            "_list": {
                "_element": "a.item::attr(href)",
                "_pagination": "a.next::attr(href)",
                "name": "h1::text"
            }
        }))
        .unwrap();

        assert_eq!(schema.pagination.as_ref().unwrap().raw(), "a.next::attr(href)");
        match &schema.entries[0] {
            Entry::ListFollow { element, schema: child } => {
                assert_eq!(element.raw(), "a.item::attr(href)");
                assert_eq!(child.entries.len(), 1);
                assert!(child.pagination.is_none());
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_loop_descriptor_with_nested_loop() {
        let schema = compile(&json!({
            "_loop": {
                "_element": "li.product",
                "_key": "products",
                "name": "h3::text",
                "qty*": ".qty::text",
                "variants": {
                    "_element": "ul.variants li",
                    "label": "::text"
                }
            }
        }))
        .unwrap();

        match &schema.entries[0] {
            Entry::Loop(spec) => {
                assert_eq!(spec.output_key, "products");
                assert_eq!(spec.fields.len(), 3);
                match &spec.fields[2] {
                    LoopField::Nested(nested) => {
                        assert_eq!(nested.output_key, DEFAULT_NESTED_LOOP_KEY);
                        assert_eq!(nested.fields.len(), 1);
                    }
                    other => panic!("unexpected field {:?}", other),
                }
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_loop_default_key() {
        let schema = compile(&json!({"_loop": {"_element": "li", "x": "::text"}})).unwrap();
        match &schema.entries[0] {
            Entry::Loop(spec) => assert_eq!(spec.output_key, DEFAULT_LOOP_KEY),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_nested_group_and_reserved_keys() {
        let schema = compile(&json!({
            "@comment": "ignored",
            "_version": "ignored",
            "seller*": {"name": ".seller::text"}
        }))
        .unwrap();

        assert_eq!(schema.entries.len(), 1);
        match &schema.entries[0] {
            Entry::Group { key, group } => {
                assert_eq!(key.name, "seller");
                assert!(key.optional);
                assert_eq!(group.entries.len(), 1);
            }
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_nested_group_pagination_moves_to_parent() {
        let schema = compile(&json!({
            "title": "h1::text",
            "seller": {"_pagination": "a.next::attr(href)", "name": ".name::text"}
        }))
        .unwrap();

        assert_eq!(schema.pagination.as_ref().unwrap().raw(), "a.next::attr(href)");
        match &schema.entries[1] {
            Entry::Group { group, .. } => assert!(group.pagination.is_none()),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_missing_element_is_an_error() {
        let err = compile(&json!({"_list": {"name": "h1"}})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingElement { .. }));
    }

    #[test]
    fn test_invalid_selector_reports_path() {
        let err = compile(&json!({"group": {"bad": "div["}})).unwrap_err();
        match err {
            SchemaError::InvalidSelector { path, .. } => assert_eq!(path, "structure.group.bad"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_value_type() {
        let err = compile(&json!({"count": 3})).unwrap_err();
        assert!(matches!(err, SchemaError::UnexpectedValue { found: "a number", .. }));
        assert!(matches!(compile(&json!(["a"])), Err(SchemaError::RootNotMapping)));
    }
}
