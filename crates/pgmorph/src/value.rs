//! Loosely typed field values.
//!
//! Catalog rows, parsed snippets and inverse construction all funnel through
//! [`FieldMap`]: an ordered key→value map. Reading through a kind's field
//! descriptors resolves aliases; keys no descriptor knows about are silently
//! dropped, which is what makes loose reconstruction from heterogeneous
//! inputs possible.

use serde::{Deserialize, Serialize};

use crate::ident::QualifiedName;

/// A loosely typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Short or long text; also carries qualified names in dotted form.
    Text(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested key→value record (e.g. one column of a dropped table).
    Map(FieldMap),
}

impl Value {
    /// Convenience constructor for text values.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Convenience constructor for a list of text values.
    #[must_use]
    pub fn texts<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }

    /// The boolean payload, if this is a flag.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer payload, if numeric.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The text payload, if textual.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// An ordered key→value map. Insertion order is preserved; inserting an
/// existing key replaces its value in place (last declaration wins).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    entries: Vec<(String, Value)>,
}

impl FieldMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a value by exact key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Text value by exact key.
    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_text)
    }

    /// Boolean value by exact key, defaulting to `false`.
    #[must_use]
    pub fn get_flag(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Qualified name parsed from a text value.
    #[must_use]
    pub fn get_name(&self, key: &str) -> Option<QualifiedName> {
        self.get_text(key).map(QualifiedName::parse)
    }

    /// Text list by exact key. A single text value is accepted as a
    /// one-element list shorthand.
    #[must_use]
    pub fn get_texts(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| v.as_text().map(str::to_string))
                .collect(),
            Some(Value::Text(t)) => vec![t.clone()],
            _ => Vec::new(),
        }
    }

    /// Nested records by exact key.
    #[must_use]
    pub fn get_maps(&self, key: &str) -> Vec<&FieldMap> {
        match self.get(key) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Value::Map(m) => Some(m),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
