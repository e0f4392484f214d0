//! Enum type operations.
//!
//! Enum labels keep their declaration order (the order is the type's
//! comparison order), so the value list is an ordered list rather than a
//! symbol set. Adding a label is the canonical structurally one-way
//! change: PostgreSQL has no `ALTER TYPE ... DROP VALUE`.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fields::{FieldDescriptor, FieldType, KindDescriptor, OpCommon};
use crate::ident::QualifiedName;
use crate::invert::{create_guards, drop_guards, Reason};
use crate::quote;
use crate::validate::Checker;
use crate::value::{FieldMap, Value};
use crate::version::ServerVersion;

use super::{comment_sql, Operation};

pub(crate) const CREATE_ENUM: KindDescriptor = KindDescriptor {
    keyword: "create_enum",
    positional: &["name", "values"],
    fields: &[FieldDescriptor {
        name: "values",
        aliases: &["labels"],
        ftype: FieldType::TextList,
    }],
};

pub(crate) const ALTER_ENUM: KindDescriptor = KindDescriptor {
    keyword: "alter_enum",
    positional: &["name", "add_value"],
    fields: &[
        FieldDescriptor {
            name: "add_value",
            aliases: &["add"],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "before",
            aliases: &[],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "after",
            aliases: &[],
            ftype: FieldType::Text,
        },
    ],
};

pub(crate) const DROP_ENUM: KindDescriptor = KindDescriptor {
    keyword: "drop_enum",
    positional: &["name"],
    fields: &[FieldDescriptor {
        name: "from_values",
        aliases: &[],
        ftype: FieldType::TextList,
    }],
};

/// `CREATE TYPE ... AS ENUM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEnum {
    /// Shared fields.
    pub common: OpCommon,
    /// Labels in declaration order.
    pub values: Vec<String>,
}

impl CreateEnum {
    /// Creates the operation.
    #[must_use]
    pub fn new<I, S>(name: QualifiedName, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            common: OpCommon::named(name),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.require("values", !self.values.is_empty());
        let mut seen = std::collections::BTreeSet::new();
        for value in &self.values {
            c.ensure(
                "values",
                seen.insert(value.as_str()),
                &format!("duplicate label '{value}'"),
            );
        }
        c.forbid("if_exists", !self.common.if_exists);
        // CREATE TYPE has no IF NOT EXISTS form.
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let reasons = create_guards(&self.common);
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::DropEnum(DropEnum {
            common,
            from_values: Some(self.values.clone()),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let labels: Vec<String> = self.values.iter().map(|v| quote::literal(v)).collect();
        let mut sql = format!(
            "CREATE TYPE {} AS ENUM ({})",
            self.common.name.sql(),
            labels.join(", ")
        );
        if let Some(comment) = &self.common.comment {
            sql.push_str(";\n");
            sql.push_str(&comment_sql("TYPE", &self.common.name, Some(comment)));
        }
        sql
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            values: if map.get("values").is_some() {
                map.get_texts("values")
            } else {
                map.get_texts("labels")
            },
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        map.insert("values", Value::texts(self.values.clone()));
    }
}

/// `ALTER TYPE ... ADD VALUE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterEnum {
    /// Shared fields; `if_not_exists` maps to `ADD VALUE IF NOT EXISTS`.
    pub common: OpCommon,
    /// The label to add.
    pub add_value: String,
    /// Insert before this existing label (PostgreSQL 10+).
    pub before: Option<String>,
    /// Insert after this existing label (PostgreSQL 10+).
    pub after: Option<String>,
}

impl AlterEnum {
    /// Appends a label at the end of the enum.
    #[must_use]
    pub fn add_value(name: QualifiedName, value: impl Into<String>) -> Self {
        Self {
            common: OpCommon::named(name),
            add_value: value.into(),
            before: None,
            after: None,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.require("add_value", !self.add_value.is_empty());
        c.ensure(
            "before",
            self.before.is_none() || self.after.is_none(),
            "cannot combine before and after",
        );
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
        c.forbid("comment", self.common.comment.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        Err(vec![Reason::one_way(format!(
            "enum label '{}' cannot be removed from '{}' once added",
            self.add_value, self.common.name
        ))])
    }

    pub(crate) fn sql(&self, target: ServerVersion) -> Result<String, Error> {
        if (self.before.is_some() || self.after.is_some()) && target < ServerVersion::V10 {
            return Err(Error::UnsupportedAtVersion {
                feature: "ALTER TYPE ... ADD VALUE BEFORE/AFTER".to_string(),
                required: ServerVersion::V10,
                actual: target,
            });
        }
        let mut sql = format!("ALTER TYPE {} ADD VALUE ", self.common.name.sql());
        if self.common.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&quote::literal(&self.add_value));
        if let Some(before) = &self.before {
            sql.push_str(&format!(" BEFORE {}", quote::literal(before)));
        }
        if let Some(after) = &self.after {
            sql.push_str(&format!(" AFTER {}", quote::literal(after)));
        }
        Ok(sql)
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            add_value: ALTER_ENUM
                .pick(map, "add_value")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string(),
            before: map.get_text("before").map(str::to_string),
            after: map.get_text("after").map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        map.insert("add_value", Value::text(self.add_value.clone()));
        if let Some(before) = &self.before {
            map.insert("before", Value::text(before.clone()));
        }
        if let Some(after) = &self.after {
            map.insert("after", Value::text(after.clone()));
        }
    }
}

/// `DROP TYPE` for an enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEnum {
    /// Shared fields.
    pub common: OpCommon,
    /// Shadow of the dropped labels; required for inversion.
    pub from_values: Option<Vec<String>>,
}

impl DropEnum {
    /// Creates the operation with no shadow state.
    #[must_use]
    pub fn new(name: QualifiedName) -> Self {
        Self {
            common: OpCommon::named(name),
            from_values: None,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let mut reasons = drop_guards(&self.common);
        if self.from_values.is_none() {
            reasons.push(Reason::missing_shadow("values"));
        }
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::CreateEnum(CreateEnum {
            common,
            values: self.from_values.clone().unwrap_or_default(),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("DROP TYPE ");
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
            from_values: map.get("from_values").map(|_| map.get_texts("from_values")),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        if let Some(values) = &self.from_values {
            map.insert("from_values", Value::texts(values.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invert::ReasonKind;

    fn status() -> QualifiedName {
        QualifiedName::parse("public.user_status")
    }

    #[test]
    fn test_create_enum_sql_preserves_order() {
        let op = CreateEnum::new(status(), ["pending", "active", "banned"]);
        assert_eq!(
            op.sql(),
            "CREATE TYPE public.user_status AS ENUM ('pending', 'active', 'banned')"
        );
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let op = CreateEnum::new(status(), ["active", "active"]);
        let mut c = Checker::new();
        op.rules(&mut c);
        assert!(c.finish().iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn test_add_value_is_one_way() {
        let op = AlterEnum::add_value(status(), "suspended");
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].kind, ReasonKind::StructurallyOneWay);
        assert!(reasons[0].mentions("suspended"));
    }

    #[test]
    fn test_positioned_add_gated_on_v10() {
        let mut op = AlterEnum::add_value(status(), "suspended");
        op.before = Some("banned".to_string());
        assert!(matches!(
            op.sql(ServerVersion::from_major(9)),
            Err(Error::UnsupportedAtVersion { .. })
        ));
        assert_eq!(
            op.sql(ServerVersion::V10).unwrap(),
            "ALTER TYPE public.user_status ADD VALUE 'suspended' BEFORE 'banned'"
        );
    }

    #[test]
    fn test_add_value_if_not_exists() {
        let mut op = AlterEnum::add_value(status(), "suspended");
        op.common.if_not_exists = true;
        assert_eq!(
            op.sql(ServerVersion::V14).unwrap(),
            "ALTER TYPE public.user_status ADD VALUE IF NOT EXISTS 'suspended'"
        );
    }

    #[test]
    fn test_drop_enum_round_trip_with_shadow() {
        let op = CreateEnum::new(status(), ["pending", "active"]);
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::DropEnum(drop) => {
                let back = drop.invert().unwrap().unwrap();
                match back {
                    Operation::CreateEnum(create) => {
                        assert_eq!(create.values, vec!["pending", "active"]);
                    }
                    other => panic!("expected CreateEnum, got {:?}", other.kind()),
                }
            }
            other => panic!("expected DropEnum, got {:?}", other.kind()),
        }
    }
}
