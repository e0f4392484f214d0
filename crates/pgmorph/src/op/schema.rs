//! Schema (namespace) operations.

use serde::{Deserialize, Serialize};

use crate::fields::{KindDescriptor, OpCommon};
use crate::invert::{create_guards, drop_guards, Reason};
use crate::ident::QualifiedName;
use crate::validate::Checker;
use crate::value::FieldMap;

use super::{comment_sql, Operation};

pub(crate) const CREATE_SCHEMA: KindDescriptor = KindDescriptor {
    keyword: "create_schema",
    positional: &["name"],
    fields: &[],
};

pub(crate) const DROP_SCHEMA: KindDescriptor = KindDescriptor {
    keyword: "drop_schema",
    positional: &["name"],
    fields: &[],
};

/// `CREATE SCHEMA`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSchema {
    /// Shared fields; `name` must be unqualified.
    pub common: OpCommon,
}

impl CreateSchema {
    /// Creates the operation.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            common: OpCommon::named(QualifiedName::local(name.into())),
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.ensure(
            "name",
            self.common.name.namespace.is_none(),
            "must be unqualified",
        );
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let reasons = create_guards(&self.common);
        if !reasons.is_empty() {
            return Err(reasons);
        }
        Ok(Some(Operation::DropSchema(DropSchema {
            common: OpCommon::named(self.common.name.clone()),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("CREATE SCHEMA ");
        if self.common.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&self.common.name.sql());
        if let Some(comment) = &self.common.comment {
            sql.push_str(";\n");
            sql.push_str(&comment_sql("SCHEMA", &self.common.name, Some(comment)));
        }
        sql
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

/// `DROP SCHEMA`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropSchema {
    /// Shared fields; `comment` carries the dropped schema's comment as a
    /// restoration shadow.
    pub common: OpCommon,
}

impl DropSchema {
    /// Creates the operation.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            common: OpCommon::named(QualifiedName::local(name.into())),
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let reasons = drop_guards(&self.common);
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::CreateSchema(CreateSchema { common })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("DROP SCHEMA ");
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
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Force;

    #[test]
    fn test_create_schema_sql() {
        let op = CreateSchema::new("app");
        assert_eq!(op.sql(), "CREATE SCHEMA app");

        let mut op = CreateSchema::new("app");
        op.common.if_not_exists = true;
        op.common.comment = Some("application objects".to_string());
        assert_eq!(
            op.sql(),
            "CREATE SCHEMA IF NOT EXISTS app;\nCOMMENT ON SCHEMA app IS 'application objects'"
        );
    }

    #[test]
    fn test_drop_schema_sql() {
        let mut op = DropSchema::new("app");
        op.common.if_exists = true;
        op.common.force = Force::Cascade;
        assert_eq!(op.sql(), "DROP SCHEMA IF EXISTS app CASCADE");
    }

    #[test]
    fn test_qualified_schema_name_rejected() {
        let mut op = CreateSchema::new("app");
        op.common.name = QualifiedName::parse("public.app");
        let mut c = Checker::new();
        op.rules(&mut c);
        assert!(c.finish().iter().any(|e| e.message.contains("unqualified")));
    }

    #[test]
    fn test_create_then_drop_round() {
        let op = CreateSchema::new("app");
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::DropSchema(drop) => assert_eq!(drop.common.name.name, "app"),
            other => panic!("expected DropSchema, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_drop_restores_comment() {
        let mut op = DropSchema::new("app");
        op.common.comment = Some("application objects".to_string());
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::CreateSchema(create) => {
                assert_eq!(create.common.comment.as_deref(), Some("application objects"));
            }
            other => panic!("expected CreateSchema, got {:?}", other.kind()),
        }
    }
}
