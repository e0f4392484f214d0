//! Shared operation fields, previous-value tracking and the static field
//! registration tables.
//!
//! The registration tables replace a dynamic per-kind attribute registry:
//! each operation kind declares its fields once in a read-only descriptor
//! array. A kind-specific declaration shadows the shared base table, so a
//! redeclared field wins — repeated declaration is idempotent by
//! construction.

use serde::{Deserialize, Serialize};

use crate::ident::{Oid, QualifiedName};
use crate::value::{FieldMap, Value};
use crate::version::ServerVersion;

/// A field value paired with its caller-supplied prior value.
///
/// The prior value exists only to make inversion possible; a changed field
/// with no recorded prior value is the single most common irreversibility
/// cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracked<T> {
    /// Current (target) value.
    pub value: T,
    /// Caller-supplied prior value, when known.
    pub previous: Option<T>,
}

impl<T> Tracked<T> {
    /// A value with no recorded prior state.
    pub fn new(value: T) -> Self {
        Self {
            value,
            previous: None,
        }
    }

    /// A value together with its prior state.
    pub fn with_previous(value: T, previous: T) -> Self {
        Self {
            value,
            previous: Some(previous),
        }
    }
}

impl<T: Clone> Tracked<T> {
    /// The same change seen from the other direction, when the prior value
    /// is known.
    #[must_use]
    pub fn swapped(&self) -> Option<Self> {
        self.previous
            .as_ref()
            .map(|prev| Self::with_previous(prev.clone(), self.value.clone()))
    }
}

/// How dependent objects are handled when dropping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Force {
    /// Refuse the drop if dependents exist.
    #[default]
    Restrict,
    /// Drop dependents along with the object.
    Cascade,
}

impl Force {
    /// Whether dependents are cascaded.
    #[must_use]
    pub fn is_cascade(self) -> bool {
        matches!(self, Self::Cascade)
    }

    /// SQL suffix for drop statements (empty for the restrict default).
    #[must_use]
    pub fn sql_suffix(self) -> &'static str {
        match self {
            Self::Restrict => "",
            Self::Cascade => " CASCADE",
        }
    }
}

/// Fields shared by every named operation kind.
///
/// Kinds embed this struct instead of inheriting accessors; attributes a
/// kind does not accept are rejected by its absence rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpCommon {
    /// Qualified object name.
    pub name: QualifiedName,
    /// Rename target; must differ meaningfully from `name`.
    pub new_name: Option<QualifiedName>,
    /// Catalog identity, assigned after execution.
    pub oid: Option<Oid>,
    /// Target-schema-version marker; the operation is a no-op when rendered
    /// against an older target.
    pub version: Option<ServerVersion>,
    /// Suppress the error if the object is absent (drops).
    pub if_exists: bool,
    /// Suppress the error if the object already exists (creates).
    pub if_not_exists: bool,
    /// Dependent-object policy for drops.
    pub force: Force,
    /// Object comment applied at creation time.
    pub comment: Option<String>,
}

impl OpCommon {
    /// Common fields for a freshly named object, everything else default.
    #[must_use]
    pub fn named(name: QualifiedName) -> Self {
        Self {
            name,
            new_name: None,
            oid: None,
            version: None,
            if_exists: false,
            if_not_exists: false,
            force: Force::Restrict,
            comment: None,
        }
    }

    /// Reconstructs the shared fields from a key→value map, resolving
    /// aliases through the base descriptor table. Unknown keys are ignored.
    #[must_use]
    pub fn from_fields(map: &FieldMap) -> Self {
        let pick = |key: &str| {
            COMMON_FIELDS
                .iter()
                .find(|d| d.name == key)
                .and_then(|d| map.iter().find(|(k, _)| d.matches(k)).map(|(_, v)| v))
        };

        Self {
            name: pick("name")
                .and_then(Value::as_text)
                .map(QualifiedName::parse)
                .unwrap_or_else(|| QualifiedName::local("")),
            new_name: pick("to").and_then(Value::as_text).map(QualifiedName::parse),
            oid: pick("oid")
                .and_then(Value::as_int)
                .and_then(|i| u32::try_from(i).ok())
                .map(Oid),
            version: pick("version")
                .and_then(Value::as_text)
                .and_then(ServerVersion::parse),
            if_exists: pick("if_exists").and_then(Value::as_bool).unwrap_or(false),
            if_not_exists: pick("if_not_exists")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            force: if pick("cascade").and_then(Value::as_bool).unwrap_or(false) {
                Force::Cascade
            } else {
                Force::Restrict
            },
            comment: pick("comment").and_then(Value::as_text).map(str::to_string),
        }
    }

    /// Writes the shared fields into `map` in canonical form: defaults are
    /// omitted, the catalog identity is execution-time state and never part
    /// of the serialized attribute state.
    pub fn write_fields(&self, map: &mut FieldMap) {
        map.insert("name", Value::text(self.name.normalized()));
        if let Some(to) = &self.new_name {
            map.insert("to", Value::text(to.normalized()));
        }
        if self.if_not_exists {
            map.insert("if_not_exists", Value::Bool(true));
        }
        if self.if_exists {
            map.insert("if_exists", Value::Bool(true));
        }
        if self.force.is_cascade() {
            map.insert("cascade", Value::Bool(true));
        }
        if let Some(comment) = &self.comment {
            map.insert("comment", Value::text(comment.clone()));
        }
        if let Some(version) = self.version {
            map.insert("version", Value::text(version.to_string()));
        }
    }
}

/// Semantic type of a declared field, driving canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Boolean flag.
    Bool,
    /// Integer.
    Int,
    /// Short or long text.
    Text,
    /// Qualified name in dotted form.
    Name,
    /// Ordered list of short texts.
    TextList,
    /// Unordered set of symbols; canonicalized to a sorted, deduplicated
    /// list of strings.
    SymbolSet,
    /// List of nested records.
    Records,
}

impl FieldType {
    /// Applies the type's canonical form to a raw value.
    #[must_use]
    pub fn canonicalize(self, value: Value) -> Value {
        match (self, value) {
            (Self::SymbolSet, Value::List(items)) => {
                let mut texts: Vec<String> = items
                    .iter()
                    .filter_map(|v| v.as_text().map(str::to_ascii_lowercase))
                    .collect();
                texts.sort();
                texts.dedup();
                Value::texts(texts)
            }
            (Self::Name, Value::Text(t)) => Value::text(QualifiedName::parse(&t).normalized()),
            (_, value) => value,
        }
    }
}

/// A declared field: canonical name, external aliases and semantic type.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Canonical field name.
    pub name: &'static str,
    /// Alternate external keys reaching the same field.
    pub aliases: &'static [&'static str],
    /// Semantic type.
    pub ftype: FieldType,
}

impl FieldDescriptor {
    /// Whether `key` refers to this field (canonical name or alias).
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.name == key || self.aliases.contains(&key)
    }
}

/// The shared base field table every kind layers its own declarations on.
pub const COMMON_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "name",
        aliases: &[],
        ftype: FieldType::Name,
    },
    FieldDescriptor {
        name: "to",
        aliases: &["new_name", "rename_to"],
        ftype: FieldType::Name,
    },
    FieldDescriptor {
        name: "oid",
        aliases: &[],
        ftype: FieldType::Int,
    },
    FieldDescriptor {
        name: "if_not_exists",
        aliases: &[],
        ftype: FieldType::Bool,
    },
    FieldDescriptor {
        name: "if_exists",
        aliases: &[],
        ftype: FieldType::Bool,
    },
    FieldDescriptor {
        name: "cascade",
        aliases: &["force"],
        ftype: FieldType::Bool,
    },
    FieldDescriptor {
        name: "comment",
        aliases: &[],
        ftype: FieldType::Text,
    },
    FieldDescriptor {
        name: "version",
        aliases: &["since"],
        ftype: FieldType::Text,
    },
];

/// Static registration entry for one operation kind: its snippet keyword,
/// positional argument names and declared fields.
#[derive(Debug, Clone, Copy)]
pub struct KindDescriptor {
    /// Snippet keyword (`create_table`, `drop_index`, ...).
    pub keyword: &'static str,
    /// Field names bound to positional snippet arguments, in order.
    pub positional: &'static [&'static str],
    /// Kind-specific field declarations, in emission order.
    pub fields: &'static [FieldDescriptor],
}

impl KindDescriptor {
    /// Looks up a declared field by canonical name, falling back to the
    /// shared base table. The kind-specific table is scanned first, so a
    /// redeclaration shadows the base.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&'static FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == key)
            .or_else(|| COMMON_FIELDS.iter().find(|f| f.name == key))
    }

    /// Finds the field an external key refers to, honoring aliases. Keys no
    /// descriptor knows about resolve to `None` and are dropped.
    #[must_use]
    pub fn resolve_key(&self, key: &str) -> Option<&'static FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.matches(key))
            .or_else(|| COMMON_FIELDS.iter().find(|f| f.matches(key)))
    }

    /// Resolves a canonical field name against `map`, honoring aliases.
    #[must_use]
    pub fn pick<'a>(&self, map: &'a FieldMap, key: &str) -> Option<&'a Value> {
        let desc = self.field(key)?;
        map.iter().find(|(k, _)| desc.matches(k)).map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_swapped() {
        let change = Tracked::with_previous("bigint".to_string(), "integer".to_string());
        let back = change.swapped().unwrap();
        assert_eq!(back.value, "integer");
        assert_eq!(back.previous.as_deref(), Some("bigint"));

        assert!(Tracked::new("text".to_string()).swapped().is_none());
    }

    #[test]
    fn test_common_from_fields_resolves_aliases() {
        let map = FieldMap::new()
            .with("name", Value::text("public.users"))
            .with("new_name", Value::text("public.accounts"))
            .with("force", Value::Bool(true))
            .with("unknown_key", Value::Bool(true));

        let common = OpCommon::from_fields(&map);
        assert_eq!(common.name.name, "users");
        assert_eq!(common.new_name.unwrap().name, "accounts");
        assert!(common.force.is_cascade());
    }

    #[test]
    fn test_write_fields_omits_defaults() {
        let common = OpCommon::named(QualifiedName::parse("public.users"));
        let mut map = FieldMap::new();
        common.write_fields(&mut map);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_text("name"), Some("public.users"));
    }

    #[test]
    fn test_symbol_set_canonicalization() {
        let raw = Value::texts(["UPDATE", "insert", "update"]);
        let canonical = FieldType::SymbolSet.canonicalize(raw);
        assert_eq!(canonical, Value::texts(["insert", "update"]));
    }
}
