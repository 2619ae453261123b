//! Tagged schema tree
//!
//! A schema is a tree of [`Group`]s. Each group holds its entries in declared
//! order and an optional pagination selector that re-applies the whole group to
//! the next page.

use crate::extract::SelectorExpr;
use std::fmt;
use std::sync::Arc;

/// Marker that flags a key as optional when it trails the key name
pub const OPTIONAL_MARKER: char = '*';

/// Output key used for a loop without `_key`
pub const DEFAULT_LOOP_KEY: &str = "loop_data";

/// Output key used for a nested loop without `_key`
pub const DEFAULT_NESTED_LOOP_KEY: &str = "nested_loop";

/// Output key of a field together with its optional flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey {
    pub name: String,
    pub optional: bool,
}

impl FieldKey {
    /// Splits a schema key into its base name and optional flag
    ///
    /// ```
    /// use trawl::schema::FieldKey;
    ///
    /// let key = FieldKey::parse("price*");
    /// assert_eq!(key.name, "price");
    /// assert!(key.optional);
    /// ```
    pub fn parse(key: &str) -> Self {
        Self {
            name: key.trim_end_matches(OPTIONAL_MARKER).to_string(),
            optional: key.ends_with(OPTIONAL_MARKER),
        }
    }
}

/// A mapping level of the schema
#[derive(Debug, Clone, Default)]
pub struct Group {
    /// Entries in declared order
    pub entries: Vec<Entry>,

    /// Selector for a "next page" link that re-applies this group
    pub pagination: Option<SelectorExpr>,
}

/// One entry of a [`Group`]
#[derive(Debug, Clone)]
pub enum Entry {
    /// A scalar or list of strings extracted with a selector
    Field { key: FieldKey, selector: SelectorExpr },

    /// A nested mapping stored under `key`
    Group { key: FieldKey, group: Arc<Group> },

    /// Links to follow, each interpreted against `schema`
    ListFollow {
        element: SelectorExpr,
        schema: Arc<Group>,
    },

    /// Repeated in-page elements collected into an ordered list
    Loop(LoopSpec),
}

/// Repeated-element extraction
#[derive(Debug, Clone)]
pub struct LoopSpec {
    pub element: SelectorExpr,
    pub output_key: String,
    pub fields: Vec<LoopField>,
}

/// A field re-applied against every loop element
#[derive(Debug, Clone)]
pub enum LoopField {
    Field { key: FieldKey, selector: SelectorExpr },
    Nested(NestedLoop),
}

/// A loop inside a loop element; its fields are plain selectors
#[derive(Debug, Clone)]
pub struct NestedLoop {
    pub element: SelectorExpr,
    pub output_key: String,
    pub fields: Vec<(FieldKey, SelectorExpr)>,
}

impl Group {
    fn write_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);

        if let Some(pagination) = &self.pagination {
            writeln!(f, "{}next page: {}", pad, pagination)?;
        }

        for entry in &self.entries {
            match entry {
                Entry::Field { key, selector } => {
                    writeln!(f, "{}{}{} <- {}", pad, key.name, optional_tag(key), selector)?;
                }
                Entry::Group { key, group } => {
                    writeln!(f, "{}{}{}:", pad, key.name, optional_tag(key))?;
                    group.write_tree(f, depth + 1)?;
                }
                Entry::ListFollow { element, schema } => {
                    writeln!(f, "{}follow each {}:", pad, element)?;
                    schema.write_tree(f, depth + 1)?;
                }
                Entry::Loop(spec) => {
                    writeln!(f, "{}{} = for each {}:", pad, spec.output_key, spec.element)?;
                    for field in &spec.fields {
                        match field {
                            LoopField::Field { key, selector } => writeln!(
                                f,
                                "{}  {}{} <- {}",
                                pad,
                                key.name,
                                optional_tag(key),
                                selector
                            )?,
                            LoopField::Nested(nested) => {
                                writeln!(
                                    f,
                                    "{}  {} = for each {}:",
                                    pad, nested.output_key, nested.element
                                )?;
                                for (key, selector) in &nested.fields {
                                    writeln!(
                                        f,
                                        "{}    {}{} <- {}",
                                        pad,
                                        key.name,
                                        optional_tag(key),
                                        selector
                                    )?;
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn optional_tag(key: &FieldKey) -> &'static str {
    if key.optional {
        " (optional)"
    } else {
        ""
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}
