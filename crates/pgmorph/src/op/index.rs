//! Index operations.

use serde::{Deserialize, Serialize};

use crate::fields::{FieldDescriptor, FieldType, KindDescriptor, OpCommon};
use crate::ident::QualifiedName;
use crate::invert::{create_guards, drop_guards, Reason};
use crate::quote;
use crate::validate::Checker;
use crate::value::{FieldMap, Value};

use super::{comment_sql, Operation};

pub(crate) const CREATE_INDEX: KindDescriptor = KindDescriptor {
    keyword: "create_index",
    positional: &["table", "columns"],
    fields: &[
        FieldDescriptor {
            name: "table",
            aliases: &["on"],
            ftype: FieldType::Name,
        },
        FieldDescriptor {
            name: "columns",
            aliases: &[],
            ftype: FieldType::TextList,
        },
        FieldDescriptor {
            name: "unique",
            aliases: &[],
            ftype: FieldType::Bool,
        },
        FieldDescriptor {
            name: "method",
            aliases: &["using"],
            ftype: FieldType::Text,
        },
    ],
};

pub(crate) const DROP_INDEX: KindDescriptor = KindDescriptor {
    keyword: "drop_index",
    positional: &["name"],
    fields: &[
        FieldDescriptor {
            name: "from_table",
            aliases: &[],
            ftype: FieldType::Name,
        },
        FieldDescriptor {
            name: "from_columns",
            aliases: &[],
            ftype: FieldType::TextList,
        },
        FieldDescriptor {
            name: "from_unique",
            aliases: &[],
            ftype: FieldType::Bool,
        },
        FieldDescriptor {
            name: "from_method",
            aliases: &[],
            ftype: FieldType::Text,
        },
    ],
};

const METHODS: &[&str] = &["btree", "hash", "gin", "gist", "spgist", "brin"];

/// `CREATE INDEX`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndex {
    /// Shared fields; an empty `name` means "derive from table and columns".
    pub common: OpCommon,
    /// Indexed table.
    pub table: QualifiedName,
    /// Indexed column names, in order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Access method; the server default (btree) when absent.
    pub method: Option<String>,
}

impl CreateIndex {
    /// Creates an index over `columns`, name derived from the pattern.
    #[must_use]
    pub fn new<I, S>(table: QualifiedName, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            common: OpCommon::named(QualifiedName::local("")),
            table,
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            method: None,
        }
    }

    /// Marks the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the access method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// The `{table}_{columns}_idx` pattern name.
    #[must_use]
    pub fn default_name(&self) -> QualifiedName {
        QualifiedName::local(format!(
            "{}_{}_idx",
            self.table.name,
            self.columns.join("_")
        ))
    }

    /// The explicit name when one was given, the pattern name otherwise.
    #[must_use]
    pub fn effective_name(&self) -> QualifiedName {
        if self.common.name.is_empty() {
            self.default_name()
        } else {
            self.common.name.clone()
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("table", !self.table.is_empty());
        c.in_range("columns", self.columns.len() as i64, 1..=32);
        if let Some(method) = &self.method {
            c.one_of("method", method, METHODS);
        }
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let reasons = create_guards(&self.common);
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.effective_name());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::DropIndex(DropIndex {
            common,
            from_table: Some(self.table.clone()),
            from_columns: Some(self.columns.clone()),
            from_unique: self.unique,
            from_method: self.method.clone(),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("CREATE ");
        if self.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if self.common.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&quote::ident(&self.effective_name().name));
        sql.push_str(" ON ");
        sql.push_str(&self.table.sql());
        if let Some(method) = &self.method {
            sql.push_str(" USING ");
            sql.push_str(method);
        }
        let columns: Vec<String> = self.columns.iter().map(|c| quote::ident(c)).collect();
        sql.push_str(&format!(" ({})", columns.join(", ")));
        if let Some(comment) = &self.common.comment {
            sql.push_str(";\n");
            sql.push_str(&comment_sql("INDEX", &self.effective_name(), Some(comment)));
        }
        sql
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            table: CREATE_INDEX
                .pick(map, "table")
                .and_then(Value::as_text)
                .map(QualifiedName::parse)
                .unwrap_or_else(|| QualifiedName::local("")),
            columns: map.get_texts("columns"),
            unique: map.get_flag("unique"),
            method: CREATE_INDEX
                .pick(map, "method")
                .and_then(Value::as_text)
                .map(str::to_string),
        }
    }

    /// Canonical form: the name is omitted when it matches the derived
    /// pattern, so dumps stay stable under the naming convention.
    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        map.insert("table", Value::text(self.table.normalized()));
        map.insert("columns", Value::texts(self.columns.clone()));
        if !self.common.name.is_empty() && self.common.name.differs_from(&self.default_name()) {
            map.insert("name", Value::text(self.common.name.normalized()));
        }
        if self.unique {
            map.insert("unique", Value::Bool(true));
        }
        if let Some(method) = &self.method {
            map.insert("method", Value::text(method.clone()));
        }
        if self.common.if_not_exists {
            map.insert("if_not_exists", Value::Bool(true));
        }
        if let Some(comment) = &self.common.comment {
            map.insert("comment", Value::text(comment.clone()));
        }
        if let Some(version) = self.common.version {
            map.insert("version", Value::text(version.to_string()));
        }
    }
}

/// `DROP INDEX`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropIndex {
    /// Shared fields.
    pub common: OpCommon,
    /// Shadow of the indexed table; required for inversion.
    pub from_table: Option<QualifiedName>,
    /// Shadow of the indexed columns; required for inversion.
    pub from_columns: Option<Vec<String>>,
    /// Shadow of the uniqueness flag.
    pub from_unique: bool,
    /// Shadow of the access method.
    pub from_method: Option<String>,
}

impl DropIndex {
    /// Creates the operation with no shadow state.
    #[must_use]
    pub fn new(name: QualifiedName) -> Self {
        Self {
            common: OpCommon::named(name),
            from_table: None,
            from_columns: None,
            from_unique: false,
            from_method: None,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let mut reasons = drop_guards(&self.common);
        if self.from_table.is_none() {
            reasons.push(Reason::missing_shadow("table"));
        }
        if self.from_columns.is_none() {
            reasons.push(Reason::missing_shadow("columns"));
        }
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::CreateIndex(CreateIndex {
            common,
            table: self.from_table.clone().unwrap_or_else(|| QualifiedName::local("")),
            columns: self.from_columns.clone().unwrap_or_default(),
            unique: self.from_unique,
            method: self.from_method.clone(),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("DROP INDEX ");
        if self.common.if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.common.name.sql());
        sql.push_str(self.common.force.sql_suffix());
        sql
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            from_table: map.get_text("from_table").map(QualifiedName::parse),
            from_columns: map
                .get("from_columns")
                .map(|_| map.get_texts("from_columns")),
            from_unique: map.get_flag("from_unique"),
            from_method: map.get_text("from_method").map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        if let Some(table) = &self.from_table {
            map.insert("from_table", Value::text(table.normalized()));
        }
        if let Some(columns) = &self.from_columns {
            map.insert("from_columns", Value::texts(columns.clone()));
        }
        if self.from_unique {
            map.insert("from_unique", Value::Bool(true));
        }
        if let Some(method) = &self.from_method {
            map.insert("from_method", Value::text(method.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invert::ReasonKind;

    fn users() -> QualifiedName {
        QualifiedName::parse("public.users")
    }

    #[test]
    fn test_default_name_pattern() {
        let op = CreateIndex::new(users(), ["email", "active"]);
        assert_eq!(op.effective_name().name, "users_email_active_idx");
    }

    #[test]
    fn test_create_index_sql() {
        let op = CreateIndex::new(users(), ["email"]).unique();
        assert_eq!(
            op.sql(),
            "CREATE UNIQUE INDEX users_email_idx ON public.users (email)"
        );

        let op = CreateIndex::new(users(), ["payload"]).method("gin");
        assert_eq!(
            op.sql(),
            "CREATE INDEX users_payload_idx ON public.users USING gin (payload)"
        );
    }

    #[test]
    fn test_unknown_method_rejected() {
        let op = CreateIndex::new(users(), ["email"]).method("quadtree");
        let mut c = Checker::new();
        op.rules(&mut c);
        assert!(c.finish().iter().any(|e| e.field == "method"));
    }

    #[test]
    fn test_create_inverts_with_full_shadow() {
        let op = CreateIndex::new(users(), ["email"]).unique();
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::DropIndex(drop) => {
                assert_eq!(drop.common.name.name, "users_email_idx");
                assert_eq!(drop.from_table.as_ref().unwrap().name, "users");
                assert!(drop.from_unique);
            }
            other => panic!("expected DropIndex, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_drop_without_shadows_collects_all_missing() {
        let op = DropIndex::new(QualifiedName::local("users_email_idx"));
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons.len(), 2);
        assert!(reasons
            .iter()
            .all(|r| r.kind == ReasonKind::MissingPreviousValueShadow));
    }

    #[test]
    fn test_custom_name_serialized_only_when_nonstandard() {
        let standard = CreateIndex::new(users(), ["email"]);
        let mut map = FieldMap::new();
        standard.write_fields(&mut map);
        assert!(map.get("name").is_none());

        let mut custom = CreateIndex::new(users(), ["email"]);
        custom.common.name = QualifiedName::local("mail_lookup");
        let mut map = FieldMap::new();
        custom.write_fields(&mut map);
        assert_eq!(map.get_text("name"), Some("mail_lookup"));
    }
}
