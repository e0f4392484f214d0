//! Table operations: create, drop, rename, the compound `ALTER TABLE`
//! carrier and constraint validation.
//!
//! `AlterTable` is the one compound kind: it carries an ordered list of
//! column actions plus an optional comment facet. Each facet inverts
//! independently; a single unrecoverable facet fails the whole inversion
//! with the union of every facet's reasons.

use serde::{Deserialize, Serialize};

use crate::fields::{FieldDescriptor, FieldType, KindDescriptor, OpCommon, Tracked};
use crate::ident::QualifiedName;
use crate::invert::{create_guards, drop_guards, Reason, ReasonKind};
use crate::quote;
use crate::validate::Checker;
use crate::value::{FieldMap, Value};

use super::{comment_sql, Operation};

pub(crate) const CREATE_TABLE: KindDescriptor = KindDescriptor {
    keyword: "create_table",
    positional: &["name"],
    fields: &[
        FieldDescriptor {
            name: "columns",
            aliases: &[],
            ftype: FieldType::Records,
        },
        FieldDescriptor {
            name: "primary_key",
            aliases: &["pk"],
            ftype: FieldType::TextList,
        },
    ],
};

pub(crate) const DROP_TABLE: KindDescriptor = KindDescriptor {
    keyword: "drop_table",
    positional: &["name"],
    fields: &[
        FieldDescriptor {
            name: "from_columns",
            aliases: &[],
            ftype: FieldType::Records,
        },
        FieldDescriptor {
            name: "from_primary_key",
            aliases: &[],
            ftype: FieldType::TextList,
        },
    ],
};

pub(crate) const RENAME_TABLE: KindDescriptor = KindDescriptor {
    keyword: "rename_table",
    positional: &["name"],
    fields: &[],
};

pub(crate) const ALTER_TABLE: KindDescriptor = KindDescriptor {
    keyword: "alter_table",
    positional: &["name"],
    fields: &[
        FieldDescriptor {
            name: "actions",
            aliases: &[],
            ftype: FieldType::Records,
        },
        FieldDescriptor {
            name: "set_comment",
            aliases: &[],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "from_comment",
            aliases: &[],
            ftype: FieldType::Text,
        },
    ],
};

pub(crate) const VALIDATE_CONSTRAINT: KindDescriptor = KindDescriptor {
    keyword: "validate_constraint",
    positional: &["table", "name"],
    fields: &[FieldDescriptor {
        name: "table",
        aliases: &["on"],
        ftype: FieldType::Name,
    }],
};

/// One column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Raw type text (`bigint`, `character varying(255)`, ...), emitted as
    /// written.
    pub type_name: String,
    /// Whether NULL is accepted; defaults to `true`.
    pub nullable: bool,
    /// Raw default expression, when any.
    pub default: Option<String>,
}

impl ColumnDef {
    /// A nullable column with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            default: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = format!("{} {}", quote::ident(&self.name), self.type_name);
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }

    pub(crate) fn to_map(&self) -> FieldMap {
        let mut map = FieldMap::new().with("name", Value::text(self.name.clone()));
        self.write_shape(&mut map, "");
        map
    }

    /// Writes type/null/default under `prefix`; the name is keyed
    /// separately so shadow records (`from_type`, ...) can share a name key
    /// with the action they live in.
    pub(crate) fn write_shape(&self, map: &mut FieldMap, prefix: &str) {
        map.insert(format!("{prefix}type"), Value::text(self.type_name.clone()));
        if !self.nullable {
            map.insert(format!("{prefix}null"), Value::Bool(false));
        }
        if let Some(default) = &self.default {
            map.insert(format!("{prefix}default"), Value::text(default.clone()));
        }
    }

    pub(crate) fn from_map(map: &FieldMap) -> Self {
        let name = map.get_text("name").unwrap_or_default().to_string();
        Self::read_shape(map, "", name)
    }

    pub(crate) fn read_shape(map: &FieldMap, prefix: &str, name: String) -> Self {
        Self {
            name,
            type_name: map
                .get_text(&format!("{prefix}type"))
                .unwrap_or_default()
                .to_string(),
            nullable: map
                .get(&format!("{prefix}null"))
                .and_then(Value::as_bool)
                .unwrap_or(true),
            default: map
                .get_text(&format!("{prefix}default"))
                .map(str::to_string),
        }
    }
}

/// `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    /// Shared fields.
    pub common: OpCommon,
    /// Columns in declaration order; the order is preserved through
    /// serialization.
    pub columns: Vec<ColumnDef>,
    /// Primary key column names, possibly empty.
    pub primary_key: Vec<String>,
}

impl CreateTable {
    /// Creates the operation with no columns yet.
    #[must_use]
    pub fn new(name: QualifiedName) -> Self {
        Self {
            common: OpCommon::named(name),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
        // Server-side column limit.
        c.in_range("columns", self.columns.len() as i64, 1..=1600);

        let mut seen = std::collections::BTreeSet::new();
        for column in &self.columns {
            c.ensure(
                "columns",
                seen.insert(column.name.as_str()),
                &format!("duplicate column '{}'", column.name),
            );
            c.ensure(
                "columns",
                !column.type_name.is_empty(),
                &format!("column '{}' has no type", column.name),
            );
        }
        for key in &self.primary_key {
            c.ensure(
                "primary_key",
                self.columns.iter().any(|col| &col.name == key),
                &format!("references unknown column '{key}'"),
            );
        }
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let reasons = create_guards(&self.common);
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::DropTable(DropTable {
            common,
            from_columns: Some(self.columns.clone()),
            from_primary_key: Some(self.primary_key.clone()),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|column| format!("  {}", column.sql()))
            .collect();
        if !self.primary_key.is_empty() {
            let keys: Vec<String> = self.primary_key.iter().map(|k| quote::ident(k)).collect();
            lines.push(format!("  PRIMARY KEY ({})", keys.join(", ")));
        }

        let mut sql = String::from("CREATE TABLE ");
        if self.common.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.common.name.sql());
        sql.push_str(" (\n");
        sql.push_str(&lines.join(",\n"));
        sql.push_str("\n)");
        if let Some(comment) = &self.common.comment {
            sql.push_str(";\n");
            sql.push_str(&comment_sql("TABLE", &self.common.name, Some(comment)));
        }
        sql
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            columns: map
                .get_maps("columns")
                .into_iter()
                .map(ColumnDef::from_map)
                .collect(),
            primary_key: if map.get("primary_key").is_some() {
                map.get_texts("primary_key")
            } else {
                map.get_texts("pk")
            },
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        map.insert(
            "columns",
            Value::List(self.columns.iter().map(|c| Value::Map(c.to_map())).collect()),
        );
        if !self.primary_key.is_empty() {
            map.insert("primary_key", Value::texts(self.primary_key.clone()));
        }
    }
}

/// `DROP TABLE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    /// Shared fields.
    pub common: OpCommon,
    /// Shadow of the dropped table's columns; required for inversion.
    pub from_columns: Option<Vec<ColumnDef>>,
    /// Shadow of the dropped table's primary key.
    pub from_primary_key: Option<Vec<String>>,
}

impl DropTable {
    /// Creates the operation with no shadow state.
    #[must_use]
    pub fn new(name: QualifiedName) -> Self {
        Self {
            common: OpCommon::named(name),
            from_columns: None,
            from_primary_key: None,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let mut reasons = drop_guards(&self.common);
        if self.from_columns.is_none() {
            reasons.push(Reason::missing_shadow("columns"));
        }
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::CreateTable(CreateTable {
            common,
            columns: self.from_columns.clone().unwrap_or_default(),
            primary_key: self.from_primary_key.clone().unwrap_or_default(),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("DROP TABLE ");
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
            from_columns: match map.get("from_columns") {
                Some(Value::List(_)) => Some(
                    map.get_maps("from_columns")
                        .into_iter()
                        .map(ColumnDef::from_map)
                        .collect(),
                ),
                _ => None,
            },
            from_primary_key: map
                .get("from_primary_key")
                .map(|_| map.get_texts("from_primary_key")),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        if let Some(columns) = &self.from_columns {
            map.insert(
                "from_columns",
                Value::List(columns.iter().map(|c| Value::Map(c.to_map())).collect()),
            );
        }
        if let Some(keys) = &self.from_primary_key {
            if !keys.is_empty() {
                map.insert("from_primary_key", Value::texts(keys.clone()));
            }
        }
    }
}

/// `ALTER TABLE ... RENAME TO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameTable {
    /// Shared fields; both `name` and `new_name` are required.
    pub common: OpCommon,
}

impl RenameTable {
    /// Creates the operation.
    #[must_use]
    pub fn new(name: QualifiedName, to: QualifiedName) -> Self {
        let mut common = OpCommon::named(name);
        common.new_name = Some(to);
        Self { common }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.require("to", self.common.new_name.is_some());
        if let Some(to) = &self.common.new_name {
            // RENAME TO takes a bare identifier; relocating a table is a
            // SET SCHEMA matter and must not validate here.
            c.ensure(
                "to",
                self.common.name.local_normalized() != to.local_normalized(),
                "must differ from the current name",
            );
            c.ensure(
                "to",
                !self.common.name.crosses_namespace(to),
                "cannot move a table between schemas",
            );
        }
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        // Validation guarantees the target is present.
        let Some(to) = &self.common.new_name else {
            return Err(vec![Reason::missing_shadow("to")]);
        };
        let mut common = OpCommon::named(to.clone());
        common.new_name = Some(self.common.name.clone());
        common.oid = self.common.oid;
        Ok(Some(Operation::RenameTable(RenameTable { common })))
    }

    pub(crate) fn sql(&self) -> String {
        let to = self
            .common
            .new_name
            .as_ref()
            .map(|n| quote::ident(&n.name))
            .unwrap_or_default();
        format!(
            "ALTER TABLE {} RENAME TO {to}",
            self.common.name.sql()
        )
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
    }
}

/// One granular change to an existing column. Each changed facet carries
/// its own previous-value shadow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnChanges {
    /// Type change (raw type text).
    pub type_name: Option<Tracked<String>>,
    /// Nullability change.
    pub nullable: Option<Tracked<bool>>,
    /// Default expression change; clearing a default is expressed as the
    /// expression `NULL`.
    pub default: Option<Tracked<String>>,
}

impl ColumnChanges {
    /// No changes yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the type change.
    #[must_use]
    pub fn set_type(mut self, change: Tracked<String>) -> Self {
        self.type_name = Some(change);
        self
    }

    /// Sets the nullability change.
    #[must_use]
    pub fn set_nullable(mut self, change: Tracked<bool>) -> Self {
        self.nullable = Some(change);
        self
    }

    /// Sets the default-expression change.
    #[must_use]
    pub fn set_default(mut self, change: Tracked<String>) -> Self {
        self.default = Some(change);
        self
    }

    /// Whether any facet is changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.type_name.is_none() && self.nullable.is_none() && self.default.is_none()
    }

    pub(crate) fn invert(&self) -> Result<Self, Vec<Reason>> {
        let mut reasons = Vec::new();
        let type_name = invert_facet(&self.type_name, "type", &mut reasons);
        let nullable = invert_facet(&self.nullable, "null", &mut reasons);
        let default = invert_facet(&self.default, "default", &mut reasons);
        if reasons.is_empty() {
            Ok(Self {
                type_name,
                nullable,
                default,
            })
        } else {
            Err(reasons)
        }
    }

    pub(crate) fn clauses(&self, column: &str) -> Vec<String> {
        let column = quote::ident(column);
        let mut out = Vec::new();
        if let Some(change) = &self.type_name {
            out.push(format!("ALTER COLUMN {column} TYPE {}", change.value));
        }
        if let Some(change) = &self.nullable {
            out.push(if change.value {
                format!("ALTER COLUMN {column} DROP NOT NULL")
            } else {
                format!("ALTER COLUMN {column} SET NOT NULL")
            });
        }
        if let Some(change) = &self.default {
            out.push(format!("ALTER COLUMN {column} SET DEFAULT {}", change.value));
        }
        out
    }

    fn from_map(map: &FieldMap) -> Self {
        Self {
            type_name: tracked_text(map, "type", "from_type"),
            nullable: map.get("null").and_then(Value::as_bool).map(|value| {
                match map.get("from_null").and_then(Value::as_bool) {
                    Some(prev) => Tracked::with_previous(value, prev),
                    None => Tracked::new(value),
                }
            }),
            default: tracked_text(map, "default", "from_default"),
        }
    }
}

fn tracked_text(map: &FieldMap, key: &str, from_key: &str) -> Option<Tracked<String>> {
    map.get_text(key).map(|value| match map.get_text(from_key) {
        Some(prev) => Tracked::with_previous(value.to_string(), prev.to_string()),
        None => Tracked::new(value.to_string()),
    })
}

fn invert_facet<T: Clone>(
    facet: &Option<Tracked<T>>,
    name: &str,
    reasons: &mut Vec<Reason>,
) -> Option<Tracked<T>> {
    match facet {
        Some(tracked) => match tracked.swapped() {
            Some(back) => Some(back),
            None => {
                reasons.push(Reason::missing_shadow(name));
                None
            }
        },
        None => None,
    }
}

/// One action inside a compound `ALTER TABLE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableAction {
    /// `ADD COLUMN`.
    AddColumn {
        /// The new column.
        column: ColumnDef,
    },
    /// `DROP COLUMN`; the shadow carries the dropped definition.
    DropColumn {
        /// Column name.
        name: String,
        /// Shadow of the dropped column, required for inversion.
        from_column: Option<ColumnDef>,
    },
    /// `ALTER COLUMN` facets.
    AlterColumn {
        /// Column name.
        name: String,
        /// The changed facets.
        changes: ColumnChanges,
    },
    /// `RENAME COLUMN`.
    RenameColumn {
        /// Current column name.
        name: String,
        /// Target column name.
        new_name: String,
    },
}

impl TableAction {
    pub(crate) fn rules(&self, c: &mut Checker) {
        match self {
            Self::AddColumn { column } => {
                c.ensure("actions", !column.name.is_empty(), "add_column needs a column name");
                c.ensure(
                    "actions",
                    !column.type_name.is_empty(),
                    &format!("column '{}' has no type", column.name),
                );
            }
            Self::DropColumn { name, .. } => {
                c.ensure("actions", !name.is_empty(), "drop_column needs a column name");
            }
            Self::AlterColumn { name, changes } => {
                c.ensure("actions", !name.is_empty(), "alter_column needs a column name");
                c.ensure(
                    "actions",
                    !changes.is_empty(),
                    &format!("alter_column '{name}' changes nothing"),
                );
            }
            Self::RenameColumn { name, new_name } => {
                c.ensure("actions", !name.is_empty(), "rename_column needs a column name");
                c.ensure(
                    "actions",
                    !new_name.is_empty() && new_name != name,
                    &format!("rename_column '{name}' needs a different target name"),
                );
            }
        }
    }

    pub(crate) fn invert(&self) -> Result<Self, Vec<Reason>> {
        match self {
            Self::AddColumn { column } => Ok(Self::DropColumn {
                name: column.name.clone(),
                from_column: Some(column.clone()),
            }),
            Self::DropColumn { name, from_column } => match from_column {
                Some(column) => Ok(Self::AddColumn {
                    column: column.clone(),
                }),
                None => Err(vec![Reason {
                    kind: ReasonKind::MissingPreviousValueShadow,
                    detail: format!(
                        "column '{name}' was dropped but its definition was not supplied"
                    ),
                }]),
            },
            Self::AlterColumn { name, changes } => Ok(Self::AlterColumn {
                name: name.clone(),
                changes: changes.invert()?,
            }),
            Self::RenameColumn { name, new_name } => Ok(Self::RenameColumn {
                name: new_name.clone(),
                new_name: name.clone(),
            }),
        }
    }

    pub(crate) fn sql(&self, target: &str) -> String {
        match self {
            Self::AddColumn { column } => {
                format!("ALTER TABLE {target} ADD COLUMN {}", column.sql())
            }
            Self::DropColumn { name, .. } => {
                format!("ALTER TABLE {target} DROP COLUMN {}", quote::ident(name))
            }
            Self::AlterColumn { name, changes } => {
                format!("ALTER TABLE {target} {}", changes.clauses(name).join(", "))
            }
            Self::RenameColumn { name, new_name } => format!(
                "ALTER TABLE {target} RENAME COLUMN {} TO {}",
                quote::ident(name),
                quote::ident(new_name)
            ),
        }
    }

    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::AlterColumn { .. } => "alter_column",
            Self::RenameColumn { .. } => "rename_column",
        }
    }

    pub(crate) fn to_map(&self) -> FieldMap {
        let mut map = FieldMap::new().with("action", Value::text(self.keyword()));
        match self {
            Self::AddColumn { column } => {
                map.insert("name", Value::text(column.name.clone()));
                column.write_shape(&mut map, "");
            }
            Self::DropColumn { name, from_column } => {
                map.insert("name", Value::text(name.clone()));
                if let Some(column) = from_column {
                    column.write_shape(&mut map, "from_");
                }
            }
            Self::AlterColumn { name, changes } => {
                map.insert("name", Value::text(name.clone()));
                if let Some(change) = &changes.type_name {
                    map.insert("type", Value::text(change.value.clone()));
                    if let Some(prev) = &change.previous {
                        map.insert("from_type", Value::text(prev.clone()));
                    }
                }
                if let Some(change) = &changes.nullable {
                    map.insert("null", Value::Bool(change.value));
                    if let Some(prev) = change.previous {
                        map.insert("from_null", Value::Bool(prev));
                    }
                }
                if let Some(change) = &changes.default {
                    map.insert("default", Value::text(change.value.clone()));
                    if let Some(prev) = &change.previous {
                        map.insert("from_default", Value::text(prev.clone()));
                    }
                }
            }
            Self::RenameColumn { name, new_name } => {
                map.insert("name", Value::text(name.clone()));
                map.insert("to", Value::text(new_name.clone()));
            }
        }
        map
    }

    pub(crate) fn from_map(map: &FieldMap) -> Self {
        let name = map.get_text("name").unwrap_or_default().to_string();
        match map.get_text("action").unwrap_or_default() {
            "drop_column" => Self::DropColumn {
                from_column: map
                    .get_text("from_type")
                    .map(|_| ColumnDef::read_shape(map, "from_", name.clone())),
                name,
            },
            "alter_column" => Self::AlterColumn {
                name,
                changes: ColumnChanges::from_map(map),
            },
            "rename_column" => Self::RenameColumn {
                name,
                new_name: map.get_text("to").unwrap_or_default().to_string(),
            },
            // Unknown discriminators read as add_column; validation rejects
            // the shape if it is incomplete.
            _ => Self::AddColumn {
                column: ColumnDef::read_shape(map, "", name),
            },
        }
    }
}

/// Compound `ALTER TABLE`: an ordered list of column actions plus an
/// optional table-comment facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterTable {
    /// Shared fields; the creation-time `comment` attribute is not
    /// accepted here, comment changes go through the tracked facet.
    pub common: OpCommon,
    /// Column actions, applied in order.
    pub actions: Vec<TableAction>,
    /// Table comment change; `None` inside the tracked value clears the
    /// comment.
    pub comment: Option<Tracked<Option<String>>>,
}

impl AlterTable {
    /// Creates an empty compound; an empty compound renders as a no-op.
    #[must_use]
    pub fn new(name: QualifiedName) -> Self {
        Self {
            common: OpCommon::named(name),
            actions: Vec::new(),
            comment: None,
        }
    }

    /// Appends an action.
    #[must_use]
    pub fn action(mut self, action: TableAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Sets the comment facet.
    #[must_use]
    pub fn set_comment(mut self, change: Tracked<Option<String>>) -> Self {
        self.comment = Some(change);
        self
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
        c.forbid("comment", self.common.comment.is_none());
        for action in &self.actions {
            action.rules(c);
        }
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let mut reasons = drop_guards(&self.common);
        let mut inverted = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            match action.invert() {
                Ok(inverse) => inverted.push(inverse),
                Err(more) => reasons.extend(more),
            }
        }
        let comment = match &self.comment {
            Some(tracked) => match tracked.swapped() {
                Some(back) => Some(back),
                None => {
                    reasons.push(Reason::missing_shadow("comment"));
                    None
                }
            },
            None => None,
        };
        if !reasons.is_empty() {
            return Err(reasons);
        }
        // Facets undo in reverse application order.
        inverted.reverse();
        let mut common = OpCommon::named(self.common.name.clone());
        common.oid = self.common.oid;
        Ok(Some(Operation::AlterTable(AlterTable {
            common,
            actions: inverted,
            comment,
        })))
    }

    pub(crate) fn sql(&self) -> Option<String> {
        let target = if self.common.if_exists {
            format!("IF EXISTS {}", self.common.name.sql())
        } else {
            self.common.name.sql()
        };
        let mut statements: Vec<String> =
            self.actions.iter().map(|a| a.sql(&target)).collect();
        if let Some(tracked) = &self.comment {
            statements.push(comment_sql(
                "TABLE",
                &self.common.name,
                tracked.value.as_deref(),
            ));
        }
        if statements.is_empty() {
            None
        } else {
            Some(statements.join(";\n"))
        }
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        let comment = map.get("set_comment").map(|value| {
            let value = value.as_text().map(str::to_string);
            match map.get("from_comment") {
                Some(prev) => Tracked::with_previous(value, prev.as_text().map(str::to_string)),
                None => Tracked::new(value),
            }
        });
        Self {
            common: OpCommon::from_fields(map),
            actions: map
                .get_maps("actions")
                .into_iter()
                .map(TableAction::from_map)
                .collect(),
            comment,
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        if !self.actions.is_empty() {
            map.insert(
                "actions",
                Value::List(self.actions.iter().map(|a| Value::Map(a.to_map())).collect()),
            );
        }
        if let Some(tracked) = &self.comment {
            map.insert("set_comment", comment_value(tracked.value.as_deref()));
            if let Some(prev) = &tracked.previous {
                map.insert("from_comment", comment_value(prev.as_deref()));
            }
        }
    }
}

// An absent comment is a real state; `false` is its serialized sentinel.
fn comment_value(comment: Option<&str>) -> Value {
    match comment {
        Some(text) => Value::text(text),
        None => Value::Bool(false),
    }
}

/// `ALTER TABLE ... VALIDATE CONSTRAINT`.
///
/// Validation is a pure state transition on an existing constraint, so its
/// inverse is the empty set of operations rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateConstraint {
    /// Shared fields; `name` is the constraint's (local) name.
    pub common: OpCommon,
    /// Table carrying the constraint.
    pub table: QualifiedName,
}

impl ValidateConstraint {
    /// Creates the operation.
    #[must_use]
    pub fn new(table: QualifiedName, constraint: impl Into<String>) -> Self {
        Self {
            common: OpCommon::named(QualifiedName::local(constraint.into())),
            table,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("table", !self.table.is_empty());
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
        c.forbid("comment", self.common.comment.is_none());
    }

    #[allow(clippy::unnecessary_wraps)]
    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        // Nothing to undo: re-marking a constraint NOT VALID is never wanted
        // on rollback.
        Ok(None)
    }

    pub(crate) fn sql(&self) -> String {
        format!(
            "ALTER TABLE {} VALIDATE CONSTRAINT {}",
            self.table.sql(),
            quote::ident(&self.common.name.name)
        )
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            table: VALIDATE_CONSTRAINT
                .pick(map, "table")
                .and_then(Value::as_text)
                .map(QualifiedName::parse)
                .unwrap_or_else(|| QualifiedName::local("")),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        map.insert("table", Value::text(self.table.normalized()));
        self.common.write_fields(map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Force;
    use crate::invert::ReasonKind;

    fn users() -> QualifiedName {
        QualifiedName::parse("public.users")
    }

    #[test]
    fn test_create_table_sql() {
        let op = CreateTable::new(users())
            .column(ColumnDef::new("id", "bigint").not_null())
            .column(
                ColumnDef::new("email", "text")
                    .not_null()
                    .default_expr("''"),
            )
            .primary_key(["id"]);
        assert_eq!(
            op.sql(),
            "CREATE TABLE public.users (\n  id bigint NOT NULL,\n  email text NOT NULL DEFAULT '',\n  PRIMARY KEY (id)\n)"
        );
    }

    #[test]
    fn test_create_table_inverts_with_shadows() {
        let op = CreateTable::new(users())
            .column(ColumnDef::new("id", "bigint").not_null())
            .primary_key(["id"]);
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::DropTable(drop) => {
                assert_eq!(drop.from_columns.as_ref().unwrap().len(), 1);
                assert_eq!(
                    drop.from_primary_key.as_deref(),
                    Some(&["id".to_string()][..])
                );
            }
            other => panic!("expected DropTable, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_drop_table_without_shadow_is_irreversible() {
        let op = DropTable::new(users());
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].kind, ReasonKind::MissingPreviousValueShadow);
    }

    #[test]
    fn test_drop_table_cascade_collects_both_reasons() {
        let mut op = DropTable::new(users());
        op.common.force = Force::Cascade;
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons.len(), 2);
        assert_eq!(reasons[0].kind, ReasonKind::DestructiveFlagUsed);
        assert_eq!(reasons[1].kind, ReasonKind::MissingPreviousValueShadow);
    }

    #[test]
    fn test_rename_table_inverts_to_swap() {
        let op = RenameTable::new(users(), QualifiedName::parse("public.accounts"));
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::RenameTable(back) => {
                assert_eq!(back.common.name.name, "accounts");
                assert_eq!(back.common.new_name.as_ref().unwrap().name, "users");
            }
            other => panic!("expected RenameTable, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_rename_table_rejects_schema_move() {
        let op = Operation::RenameTable(RenameTable::new(
            QualifiedName::parse("app.users"),
            QualifiedName::parse("other.users"),
        ));
        let errors = op.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "to" && e.message.contains("between schemas")));
        assert!(op.validated().is_err());
    }

    #[test]
    fn test_rename_table_rejects_same_local_name() {
        // The local component alone decides: the target namespace cannot
        // make an otherwise identical name count as different.
        let op = RenameTable::new(users(), QualifiedName::local("users"));
        let mut checker = Checker::new();
        op.rules(&mut checker);
        let errors = checker.finish();
        assert!(errors
            .iter()
            .any(|e| e.field == "to" && e.message.contains("must differ")));
    }

    #[test]
    fn test_rename_table_allows_bare_local_target() {
        let op = RenameTable::new(users(), QualifiedName::local("accounts"));
        let mut checker = Checker::new();
        op.rules(&mut checker);
        assert!(checker.finish().is_empty());
        assert_eq!(op.sql(), "ALTER TABLE public.users RENAME TO accounts");
    }

    #[test]
    fn test_alter_table_inverse_reverses_action_order() {
        let op = AlterTable::new(users())
            .action(TableAction::RenameColumn {
                name: "mail".to_string(),
                new_name: "email".to_string(),
            })
            .action(TableAction::AddColumn {
                column: ColumnDef::new("active", "boolean").not_null(),
            });
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::AlterTable(alter) => {
                assert_eq!(alter.actions.len(), 2);
                assert!(matches!(alter.actions[0], TableAction::DropColumn { .. }));
                assert!(matches!(
                    alter.actions[1],
                    TableAction::RenameColumn { ref name, .. } if name == "email"
                ));
            }
            other => panic!("expected AlterTable, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_alter_table_unions_reasons_across_facets() {
        // Two unrecoverable facets: an unshadowed column drop and an
        // unshadowed comment change. Both reasons must surface.
        let op = AlterTable::new(users())
            .action(TableAction::DropColumn {
                name: "legacy".to_string(),
                from_column: None,
            })
            .set_comment(Tracked::new(Some("people".to_string())));
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].mentions("legacy"));
        assert!(reasons[1].mentions("comment"));
    }

    #[test]
    fn test_comment_clear_round_trip() {
        let op = AlterTable::new(users()).set_comment(Tracked::with_previous(
            None,
            Some("old comment".to_string()),
        ));
        assert_eq!(
            op.sql().unwrap(),
            "COMMENT ON TABLE public.users IS NULL"
        );
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::AlterTable(alter) => {
                let tracked = alter.comment.unwrap();
                assert_eq!(tracked.value.as_deref(), Some("old comment"));
                assert_eq!(tracked.previous, Some(None));
            }
            other => panic!("expected AlterTable, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_empty_alter_table_renders_nothing() {
        assert_eq!(AlterTable::new(users()).sql(), None);
    }

    #[test]
    fn test_alter_column_sql_joins_clauses() {
        let action = TableAction::AlterColumn {
            name: "age".to_string(),
            changes: ColumnChanges::new()
                .set_type(Tracked::with_previous(
                    "bigint".to_string(),
                    "integer".to_string(),
                ))
                .set_nullable(Tracked::with_previous(false, true)),
        };
        assert_eq!(
            action.sql("public.users"),
            "ALTER TABLE public.users ALTER COLUMN age TYPE bigint, ALTER COLUMN age SET NOT NULL"
        );
    }

    #[test]
    fn test_action_map_round_trip() {
        let action = TableAction::DropColumn {
            name: "email".to_string(),
            from_column: Some(ColumnDef::new("email", "text").not_null()),
        };
        let back = TableAction::from_map(&action.to_map());
        assert_eq!(back, action);
    }

    #[test]
    fn test_validate_constraint_sql_and_inverse() {
        let op = ValidateConstraint::new(users(), "users_email_check");
        assert_eq!(
            op.sql(),
            "ALTER TABLE public.users VALIDATE CONSTRAINT users_email_check"
        );
        assert_eq!(op.invert().unwrap(), None);
    }
}
