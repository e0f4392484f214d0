//! The closed set of schema operations.
//!
//! Every kind is one enum variant wrapping its own struct; shared fields
//! live in an embedded [`OpCommon`] rather than an inheritance chain.
//! Construction is loose and infallible, validation is explicit, and
//! inversion and rendering are only reachable through the [`Validated`]
//! wrapper, so an unvalidated operation cannot produce SQL.

mod enum_type;
mod function;
mod index;
mod raw;
mod schema;
mod table;
mod trigger;
mod view;

pub use enum_type::{AlterEnum, CreateEnum, DropEnum};
pub use function::{CreateFunction, DropFunction};
pub use index::{CreateIndex, DropIndex};
pub use raw::RawSql;
pub use schema::{CreateSchema, DropSchema};
pub use table::{
    AlterTable, ColumnChanges, ColumnDef, CreateTable, DropTable, RenameTable, TableAction,
    ValidateConstraint,
};
pub use trigger::{CreateTrigger, DropTrigger};
pub use view::{CreateView, DropView};

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::{KindDescriptor, OpCommon};
use crate::ident::{Oid, QualifiedName};
use crate::quote;
use crate::resolve::Identify;
use crate::validate::{Checker, FieldError};
use crate::value::FieldMap;
use crate::version::ServerVersion;

/// Discriminant for the closed set of operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    /// `CREATE SCHEMA`.
    CreateSchema,
    /// `DROP SCHEMA`.
    DropSchema,
    /// `CREATE TABLE`.
    CreateTable,
    /// `DROP TABLE`.
    DropTable,
    /// `ALTER TABLE ... RENAME TO`.
    RenameTable,
    /// Compound `ALTER TABLE`.
    AlterTable,
    /// `ALTER TABLE ... VALIDATE CONSTRAINT`.
    ValidateConstraint,
    /// `CREATE INDEX`.
    CreateIndex,
    /// `DROP INDEX`.
    DropIndex,
    /// `CREATE VIEW`.
    CreateView,
    /// `DROP VIEW`.
    DropView,
    /// `CREATE FUNCTION`.
    CreateFunction,
    /// `DROP FUNCTION`.
    DropFunction,
    /// `CREATE TRIGGER`.
    CreateTrigger,
    /// `DROP TRIGGER`.
    DropTrigger,
    /// `CREATE TYPE ... AS ENUM`.
    CreateEnum,
    /// `ALTER TYPE ... ADD VALUE`.
    AlterEnum,
    /// `DROP TYPE`.
    DropEnum,
    /// Verbatim SQL.
    RawSql,
}

impl OpKind {
    /// Every kind, in canonical declaration order.
    pub const ALL: [Self; 19] = [
        Self::CreateSchema,
        Self::DropSchema,
        Self::CreateTable,
        Self::DropTable,
        Self::RenameTable,
        Self::AlterTable,
        Self::ValidateConstraint,
        Self::CreateIndex,
        Self::DropIndex,
        Self::CreateView,
        Self::DropView,
        Self::CreateFunction,
        Self::DropFunction,
        Self::CreateTrigger,
        Self::DropTrigger,
        Self::CreateEnum,
        Self::AlterEnum,
        Self::DropEnum,
        Self::RawSql,
    ];

    /// The kind's static registration entry.
    #[must_use]
    pub fn descriptor(self) -> &'static KindDescriptor {
        match self {
            Self::CreateSchema => &schema::CREATE_SCHEMA,
            Self::DropSchema => &schema::DROP_SCHEMA,
            Self::CreateTable => &table::CREATE_TABLE,
            Self::DropTable => &table::DROP_TABLE,
            Self::RenameTable => &table::RENAME_TABLE,
            Self::AlterTable => &table::ALTER_TABLE,
            Self::ValidateConstraint => &table::VALIDATE_CONSTRAINT,
            Self::CreateIndex => &index::CREATE_INDEX,
            Self::DropIndex => &index::DROP_INDEX,
            Self::CreateView => &view::CREATE_VIEW,
            Self::DropView => &view::DROP_VIEW,
            Self::CreateFunction => &function::CREATE_FUNCTION,
            Self::DropFunction => &function::DROP_FUNCTION,
            Self::CreateTrigger => &trigger::CREATE_TRIGGER,
            Self::DropTrigger => &trigger::DROP_TRIGGER,
            Self::CreateEnum => &enum_type::CREATE_ENUM,
            Self::AlterEnum => &enum_type::ALTER_ENUM,
            Self::DropEnum => &enum_type::DROP_ENUM,
            Self::RawSql => &raw::RAW_SQL,
        }
    }

    /// The snippet keyword.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        self.descriptor().keyword
    }

    /// Resolves a snippet keyword back to its kind.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == keyword)
    }
}

/// One schema operation of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Operation {
    CreateSchema(CreateSchema),
    DropSchema(DropSchema),
    CreateTable(CreateTable),
    DropTable(DropTable),
    RenameTable(RenameTable),
    AlterTable(AlterTable),
    ValidateConstraint(ValidateConstraint),
    CreateIndex(CreateIndex),
    DropIndex(DropIndex),
    CreateView(CreateView),
    DropView(DropView),
    CreateFunction(CreateFunction),
    DropFunction(DropFunction),
    CreateTrigger(CreateTrigger),
    DropTrigger(DropTrigger),
    CreateEnum(CreateEnum),
    AlterEnum(AlterEnum),
    DropEnum(DropEnum),
    RawSql(RawSql),
}

impl Operation {
    /// The operation's kind discriminant.
    #[must_use]
    pub fn kind(&self) -> OpKind {
        match self {
            Self::CreateSchema(_) => OpKind::CreateSchema,
            Self::DropSchema(_) => OpKind::DropSchema,
            Self::CreateTable(_) => OpKind::CreateTable,
            Self::DropTable(_) => OpKind::DropTable,
            Self::RenameTable(_) => OpKind::RenameTable,
            Self::AlterTable(_) => OpKind::AlterTable,
            Self::ValidateConstraint(_) => OpKind::ValidateConstraint,
            Self::CreateIndex(_) => OpKind::CreateIndex,
            Self::DropIndex(_) => OpKind::DropIndex,
            Self::CreateView(_) => OpKind::CreateView,
            Self::DropView(_) => OpKind::DropView,
            Self::CreateFunction(_) => OpKind::CreateFunction,
            Self::DropFunction(_) => OpKind::DropFunction,
            Self::CreateTrigger(_) => OpKind::CreateTrigger,
            Self::DropTrigger(_) => OpKind::DropTrigger,
            Self::CreateEnum(_) => OpKind::CreateEnum,
            Self::AlterEnum(_) => OpKind::AlterEnum,
            Self::DropEnum(_) => OpKind::DropEnum,
            Self::RawSql(_) => OpKind::RawSql,
        }
    }

    /// The shared fields; absent only for the name-exempt raw kind.
    #[must_use]
    pub fn common(&self) -> Option<&OpCommon> {
        match self {
            Self::CreateSchema(op) => Some(&op.common),
            Self::DropSchema(op) => Some(&op.common),
            Self::CreateTable(op) => Some(&op.common),
            Self::DropTable(op) => Some(&op.common),
            Self::RenameTable(op) => Some(&op.common),
            Self::AlterTable(op) => Some(&op.common),
            Self::ValidateConstraint(op) => Some(&op.common),
            Self::CreateIndex(op) => Some(&op.common),
            Self::DropIndex(op) => Some(&op.common),
            Self::CreateView(op) => Some(&op.common),
            Self::DropView(op) => Some(&op.common),
            Self::CreateFunction(op) => Some(&op.common),
            Self::DropFunction(op) => Some(&op.common),
            Self::CreateTrigger(op) => Some(&op.common),
            Self::DropTrigger(op) => Some(&op.common),
            Self::CreateEnum(op) => Some(&op.common),
            Self::AlterEnum(op) => Some(&op.common),
            Self::DropEnum(op) => Some(&op.common),
            Self::RawSql(_) => None,
        }
    }

    /// Mutable access to the shared fields.
    #[must_use]
    pub fn common_mut(&mut self) -> Option<&mut OpCommon> {
        match self {
            Self::CreateSchema(op) => Some(&mut op.common),
            Self::DropSchema(op) => Some(&mut op.common),
            Self::CreateTable(op) => Some(&mut op.common),
            Self::DropTable(op) => Some(&mut op.common),
            Self::RenameTable(op) => Some(&mut op.common),
            Self::AlterTable(op) => Some(&mut op.common),
            Self::ValidateConstraint(op) => Some(&mut op.common),
            Self::CreateIndex(op) => Some(&mut op.common),
            Self::DropIndex(op) => Some(&mut op.common),
            Self::CreateView(op) => Some(&mut op.common),
            Self::DropView(op) => Some(&mut op.common),
            Self::CreateFunction(op) => Some(&mut op.common),
            Self::DropFunction(op) => Some(&mut op.common),
            Self::CreateTrigger(op) => Some(&mut op.common),
            Self::DropTrigger(op) => Some(&mut op.common),
            Self::CreateEnum(op) => Some(&mut op.common),
            Self::AlterEnum(op) => Some(&mut op.common),
            Self::DropEnum(op) => Some(&mut op.common),
            Self::RawSql(_) => None,
        }
    }

    /// The owning object, for kinds scoped under another object's name.
    #[must_use]
    pub fn owner(&self) -> Option<&QualifiedName> {
        match self {
            Self::ValidateConstraint(op) => Some(&op.table),
            Self::CreateIndex(op) => Some(&op.table),
            Self::DropIndex(op) => op.from_table.as_ref(),
            Self::CreateTrigger(op) => Some(&op.table),
            Self::DropTrigger(op) => Some(&op.table),
            _ => None,
        }
    }

    /// Orders two operations of the same kind by owner, then name; raw
    /// statements order by their forward text. Operations of different
    /// kinds are incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        if self.kind() != other.kind() {
            return None;
        }
        if let (Self::RawSql(a), Self::RawSql(b)) = (self, other) {
            return Some(a.up.cmp(&b.up));
        }
        let key = |op: &Self| {
            (
                op.owner().cloned(),
                op.common().map(|c| c.name.clone()),
            )
        };
        Some(key(self).cmp(&key(other)))
    }

    /// Evaluates every declared rule; an empty list means the operation is
    /// well formed.
    #[must_use]
    pub fn validate(&self) -> Vec<FieldError> {
        let mut c = Checker::new();
        match self {
            Self::CreateSchema(op) => op.rules(&mut c),
            Self::DropSchema(op) => op.rules(&mut c),
            Self::CreateTable(op) => op.rules(&mut c),
            Self::DropTable(op) => op.rules(&mut c),
            Self::RenameTable(op) => op.rules(&mut c),
            Self::AlterTable(op) => op.rules(&mut c),
            Self::ValidateConstraint(op) => op.rules(&mut c),
            Self::CreateIndex(op) => op.rules(&mut c),
            Self::DropIndex(op) => op.rules(&mut c),
            Self::CreateView(op) => op.rules(&mut c),
            Self::DropView(op) => op.rules(&mut c),
            Self::CreateFunction(op) => op.rules(&mut c),
            Self::DropFunction(op) => op.rules(&mut c),
            Self::CreateTrigger(op) => op.rules(&mut c),
            Self::DropTrigger(op) => op.rules(&mut c),
            Self::CreateEnum(op) => op.rules(&mut c),
            Self::AlterEnum(op) => op.rules(&mut c),
            Self::DropEnum(op) => op.rules(&mut c),
            Self::RawSql(op) => op.rules(&mut c),
        }
        c.finish()
    }

    /// Checks every rule and moves into the validated state, unlocking
    /// inversion and rendering.
    pub fn validated(self) -> Result<Validated> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(Validated(self))
        } else {
            Err(Error::Validation(errors))
        }
    }

    /// Loosely reconstructs an operation of `kind` from a key→value map.
    /// Never fails: unknown keys are dropped, missing ones default, and
    /// validation reports whatever is left inconsistent.
    #[must_use]
    pub fn from_fields(kind: OpKind, map: &FieldMap) -> Self {
        match kind {
            OpKind::CreateSchema => Self::CreateSchema(CreateSchema::from_fields(map)),
            OpKind::DropSchema => Self::DropSchema(DropSchema::from_fields(map)),
            OpKind::CreateTable => Self::CreateTable(CreateTable::from_fields(map)),
            OpKind::DropTable => Self::DropTable(DropTable::from_fields(map)),
            OpKind::RenameTable => Self::RenameTable(RenameTable::from_fields(map)),
            OpKind::AlterTable => Self::AlterTable(AlterTable::from_fields(map)),
            OpKind::ValidateConstraint => {
                Self::ValidateConstraint(ValidateConstraint::from_fields(map))
            }
            OpKind::CreateIndex => Self::CreateIndex(CreateIndex::from_fields(map)),
            OpKind::DropIndex => Self::DropIndex(DropIndex::from_fields(map)),
            OpKind::CreateView => Self::CreateView(CreateView::from_fields(map)),
            OpKind::DropView => Self::DropView(DropView::from_fields(map)),
            OpKind::CreateFunction => Self::CreateFunction(CreateFunction::from_fields(map)),
            OpKind::DropFunction => Self::DropFunction(DropFunction::from_fields(map)),
            OpKind::CreateTrigger => Self::CreateTrigger(CreateTrigger::from_fields(map)),
            OpKind::DropTrigger => Self::DropTrigger(DropTrigger::from_fields(map)),
            OpKind::CreateEnum => Self::CreateEnum(CreateEnum::from_fields(map)),
            OpKind::AlterEnum => Self::AlterEnum(AlterEnum::from_fields(map)),
            OpKind::DropEnum => Self::DropEnum(DropEnum::from_fields(map)),
            OpKind::RawSql => Self::RawSql(RawSql::from_fields(map)),
        }
    }

    /// The canonical key→value form, the exact mirror of
    /// [`Operation::from_fields`].
    #[must_use]
    pub fn to_fields(&self) -> FieldMap {
        let mut map = FieldMap::new();
        match self {
            Self::CreateSchema(op) => op.write_fields(&mut map),
            Self::DropSchema(op) => op.write_fields(&mut map),
            Self::CreateTable(op) => op.write_fields(&mut map),
            Self::DropTable(op) => op.write_fields(&mut map),
            Self::RenameTable(op) => op.write_fields(&mut map),
            Self::AlterTable(op) => op.write_fields(&mut map),
            Self::ValidateConstraint(op) => op.write_fields(&mut map),
            Self::CreateIndex(op) => op.write_fields(&mut map),
            Self::DropIndex(op) => op.write_fields(&mut map),
            Self::CreateView(op) => op.write_fields(&mut map),
            Self::DropView(op) => op.write_fields(&mut map),
            Self::CreateFunction(op) => op.write_fields(&mut map),
            Self::DropFunction(op) => op.write_fields(&mut map),
            Self::CreateTrigger(op) => op.write_fields(&mut map),
            Self::DropTrigger(op) => op.write_fields(&mut map),
            Self::CreateEnum(op) => op.write_fields(&mut map),
            Self::AlterEnum(op) => op.write_fields(&mut map),
            Self::DropEnum(op) => op.write_fields(&mut map),
            Self::RawSql(op) => op.write_fields(&mut map),
        }
        map
    }

    pub(crate) fn invert_raw(&self) -> std::result::Result<Option<Self>, Vec<crate::invert::Reason>> {
        match self {
            Self::CreateSchema(op) => op.invert(),
            Self::DropSchema(op) => op.invert(),
            Self::CreateTable(op) => op.invert(),
            Self::DropTable(op) => op.invert(),
            Self::RenameTable(op) => op.invert(),
            Self::AlterTable(op) => op.invert(),
            Self::ValidateConstraint(op) => op.invert(),
            Self::CreateIndex(op) => op.invert(),
            Self::DropIndex(op) => op.invert(),
            Self::CreateView(op) => op.invert(),
            Self::DropView(op) => op.invert(),
            Self::CreateFunction(op) => op.invert(),
            Self::DropFunction(op) => op.invert(),
            Self::CreateTrigger(op) => op.invert(),
            Self::DropTrigger(op) => op.invert(),
            Self::CreateEnum(op) => op.invert(),
            Self::AlterEnum(op) => op.invert(),
            Self::DropEnum(op) => op.invert(),
            Self::RawSql(op) => op.invert(),
        }
    }

    pub(crate) fn sql(&self, target: ServerVersion) -> Result<Option<String>> {
        Ok(match self {
            Self::CreateSchema(op) => Some(op.sql()),
            Self::DropSchema(op) => Some(op.sql()),
            Self::CreateTable(op) => Some(op.sql()),
            Self::DropTable(op) => Some(op.sql()),
            Self::RenameTable(op) => Some(op.sql()),
            Self::AlterTable(op) => op.sql(),
            Self::ValidateConstraint(op) => Some(op.sql()),
            Self::CreateIndex(op) => Some(op.sql()),
            Self::DropIndex(op) => Some(op.sql()),
            Self::CreateView(op) => Some(op.sql()),
            Self::DropView(op) => Some(op.sql()),
            Self::CreateFunction(op) => Some(op.sql()),
            Self::DropFunction(op) => Some(op.sql()),
            Self::CreateTrigger(op) => Some(op.sql(target)?),
            Self::DropTrigger(op) => Some(op.sql()),
            Self::CreateEnum(op) => Some(op.sql()),
            Self::AlterEnum(op) => Some(op.sql(target)?),
            Self::DropEnum(op) => Some(op.sql()),
            Self::RawSql(op) => Some(op.sql()),
        })
    }
}

impl Identify for Operation {
    fn identity(&self) -> Option<Oid> {
        self.common().and_then(|c| c.oid)
    }

    fn label(&self) -> String {
        match self.common() {
            Some(common) => format!("{} {}", self.kind().keyword(), common.name),
            None => self.kind().keyword().to_string(),
        }
    }
}

/// An operation whose rules have all been checked.
///
/// Inversion and SQL rendering live here and nowhere else, so the type
/// system rules out rendering an unvalidated operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validated(Operation);

impl Validated {
    /// The wrapped operation.
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.0
    }

    /// Unwraps back to the loose state.
    #[must_use]
    pub fn into_inner(self) -> Operation {
        self.0
    }

    /// The logical inverse: `Ok(None)` when there is nothing to undo,
    /// [`Error::Irreversible`] with every applicable reason otherwise.
    pub fn invert(&self) -> Result<Option<Validated>> {
        match self.0.invert_raw() {
            Ok(Some(inverse)) => inverse.validated().map(Some),
            Ok(None) => Ok(None),
            Err(reasons) => Err(Error::Irreversible(reasons)),
        }
    }

    /// Renders SQL against a target server version. `Ok(None)` means the
    /// operation is a no-op at this target, either because its version
    /// marker is newer or because it carries no statements.
    pub fn render(&self, target: ServerVersion) -> Result<Option<String>> {
        if let Some(common) = self.0.common() {
            if let Some(version) = common.version {
                if version > target {
                    return Ok(None);
                }
            }
        }
        self.0.sql(target)
    }

    /// The canonical snippet form.
    #[must_use]
    pub fn snippet(&self) -> String {
        crate::snippet::render(std::slice::from_ref(&self.0))
    }
}

/// `COMMENT ON` statement; `None` clears the comment.
pub(crate) fn comment_sql(object: &str, name: &QualifiedName, comment: Option<&str>) -> String {
    match comment {
        Some(text) => format!(
            "COMMENT ON {object} {} IS {}",
            name.sql(),
            quote::literal(text)
        ),
        None => format!("COMMENT ON {object} {} IS NULL", name.sql()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_keyword_round_trip() {
        for kind in OpKind::ALL {
            assert_eq!(OpKind::from_keyword(kind.keyword()), Some(kind));
        }
    }

    #[test]
    fn test_validation_gates_rendering() {
        // A create_table with no columns fails validation, so no SQL can
        // ever be produced from it.
        let op = Operation::CreateTable(CreateTable::new(QualifiedName::parse("public.users")));
        let err = op.validated().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_validated_render_and_invert() {
        let op = Operation::CreateSchema(CreateSchema::new("app"))
            .validated()
            .unwrap();
        assert_eq!(
            op.render(ServerVersion::V14).unwrap().as_deref(),
            Some("CREATE SCHEMA app")
        );
        let inverse = op.invert().unwrap().unwrap();
        assert_eq!(inverse.operation().kind(), OpKind::DropSchema);
    }

    #[test]
    fn test_version_marker_makes_noop() {
        let mut inner = CreateSchema::new("app");
        inner.common.version = Some(ServerVersion::V16);
        let op = Operation::CreateSchema(inner).validated().unwrap();
        assert_eq!(op.render(ServerVersion::V14).unwrap(), None);
        assert!(op.render(ServerVersion::V16).unwrap().is_some());
    }

    #[test]
    fn test_compare_cross_kind_is_none() {
        let a = Operation::CreateSchema(CreateSchema::new("app"));
        let b = Operation::DropSchema(DropSchema::new("app"));
        assert_eq!(a.compare(&b), None);
    }

    #[test]
    fn test_compare_orders_by_owner_then_name() {
        let table_a = QualifiedName::parse("public.accounts");
        let table_b = QualifiedName::parse("public.users");
        let a = Operation::CreateIndex(CreateIndex::new(table_a, ["id"]));
        let b = Operation::CreateIndex(CreateIndex::new(table_b.clone(), ["email"]));
        let c = Operation::CreateIndex(CreateIndex::new(table_b, ["id"]));
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(b.compare(&c), Some(Ordering::Less));
    }

    #[test]
    fn test_raw_sql_orders_by_text() {
        let a = Operation::RawSql(RawSql::new("ANALYZE"));
        let b = Operation::RawSql(RawSql::new("VACUUM"));
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_from_fields_resolves_aliases_and_drops_unknown() {
        let map = FieldMap::new()
            .with("name", Value::text("public.users"))
            .with("force", Value::Bool(true))
            .with("not_a_field", Value::Int(7));
        let op = Operation::from_fields(OpKind::DropTable, &map);
        match &op {
            Operation::DropTable(drop) => assert!(drop.common.force.is_cascade()),
            other => panic!("expected DropTable, got {:?}", other.kind()),
        }
        assert!(op.to_fields().get("not_a_field").is_none());
    }

    #[test]
    fn test_to_fields_from_fields_round_trip() {
        let original = Operation::CreateTable(
            CreateTable::new(QualifiedName::parse("public.users"))
                .column(ColumnDef::new("id", "bigint").not_null())
                .column(ColumnDef::new("email", "text"))
                .primary_key(["id"]),
        );
        let back = Operation::from_fields(original.kind(), &original.to_fields());
        assert_eq!(back, original);
    }
}
