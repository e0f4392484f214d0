//! Trigger operations.
//!
//! Trigger names are table-local, so both kinds carry the owning table
//! alongside the shared fields. `CREATE OR REPLACE TRIGGER` is gated on
//! PostgreSQL 14 at render time.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::fields::{FieldDescriptor, FieldType, KindDescriptor, OpCommon};
use crate::ident::QualifiedName;
use crate::invert::{drop_guards, Reason};
use crate::quote;
use crate::validate::Checker;
use crate::value::{FieldMap, Value};
use crate::version::ServerVersion;

use super::raw::RawSql;
use super::Operation;

pub(crate) const CREATE_TRIGGER: KindDescriptor = KindDescriptor {
    keyword: "create_trigger",
    positional: &["table", "name"],
    fields: &[
        FieldDescriptor {
            name: "table",
            aliases: &["on"],
            ftype: FieldType::Name,
        },
        FieldDescriptor {
            name: "timing",
            aliases: &[],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "events",
            aliases: &[],
            ftype: FieldType::SymbolSet,
        },
        FieldDescriptor {
            name: "function",
            aliases: &["execute"],
            ftype: FieldType::Name,
        },
        FieldDescriptor {
            name: "for_each_row",
            aliases: &["row"],
            ftype: FieldType::Bool,
        },
        FieldDescriptor {
            name: "when",
            aliases: &[],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "or_replace",
            aliases: &["replace"],
            ftype: FieldType::Bool,
        },
        FieldDescriptor {
            name: "from_statement",
            aliases: &[],
            ftype: FieldType::Text,
        },
    ],
};

pub(crate) const DROP_TRIGGER: KindDescriptor = KindDescriptor {
    keyword: "drop_trigger",
    positional: &["table", "name"],
    fields: &[
        FieldDescriptor {
            name: "table",
            aliases: &["on"],
            ftype: FieldType::Name,
        },
        FieldDescriptor {
            name: "from_statement",
            aliases: &[],
            ftype: FieldType::Text,
        },
    ],
};

const TIMINGS: &[&str] = &["before", "after", "instead of"];
const EVENTS: &[&str] = &["delete", "insert", "truncate", "update"];

/// `CREATE [OR REPLACE] TRIGGER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTrigger {
    /// Shared fields; `name` is the trigger's (table-local) name.
    pub common: OpCommon,
    /// Table the trigger fires on.
    pub table: QualifiedName,
    /// Firing timing: `before`, `after` or `instead of`.
    pub timing: String,
    /// Triggering events, kept as a sorted set.
    pub events: Vec<String>,
    /// The trigger function to execute.
    pub function: QualifiedName,
    /// Row-level rather than statement-level.
    pub for_each_row: bool,
    /// Optional firing condition, raw SQL.
    pub when: Option<String>,
    /// Replace an existing trigger in place (PostgreSQL 14+).
    pub or_replace: bool,
    /// Shadow of the replaced trigger's creation statement.
    pub from_statement: Option<String>,
}

impl CreateTrigger {
    /// Creates a row-level AFTER trigger; adjust fields from there.
    #[must_use]
    pub fn new<I, S>(
        table: QualifiedName,
        name: impl Into<String>,
        events: I,
        function: QualifiedName,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<String> = events
            .into_iter()
            .map(|e| e.into().to_ascii_lowercase())
            .collect();
        events.sort();
        events.dedup();
        Self {
            common: OpCommon::named(QualifiedName::local(name.into())),
            table,
            timing: "after".to_string(),
            events,
            function,
            for_each_row: true,
            when: None,
            or_replace: false,
            from_statement: None,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.ensure(
            "name",
            self.common.name.namespace.is_none(),
            "trigger names are table-local and must be unqualified",
        );
        c.require("table", !self.table.is_empty());
        c.require("function", !self.function.is_empty());
        c.one_of("timing", &self.timing, TIMINGS);
        c.require("events", !self.events.is_empty());
        for event in &self.events {
            c.one_of("events", event, EVENTS);
        }
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
        c.ensure(
            "from_statement",
            self.or_replace || self.from_statement.is_none(),
            "only meaningful together with or_replace",
        );
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        if self.or_replace {
            let Some(from_statement) = &self.from_statement else {
                return Err(vec![Reason::replace_without_prior(format!(
                    "trigger '{}' on '{}' was replaced but the previous statement was not supplied",
                    self.common.name, self.table
                ))]);
            };
            // The prior trigger may differ in shape, not just in function;
            // only its verbatim creation statement can restore it.
            return Ok(Some(Operation::RawSql(RawSql {
                up: from_statement.clone(),
                down: Some(self.create_sql()),
            })));
        }
        Ok(Some(Operation::DropTrigger(DropTrigger {
            common: OpCommon::named(self.common.name.clone()),
            table: self.table.clone(),
            from_statement: Some(self.create_sql()),
        })))
    }

    pub(crate) fn sql(&self, target: ServerVersion) -> Result<String, Error> {
        if self.or_replace && target < ServerVersion::V14 {
            return Err(Error::UnsupportedAtVersion {
                feature: "CREATE OR REPLACE TRIGGER".to_string(),
                required: ServerVersion::V14,
                actual: target,
            });
        }
        Ok(self.create_sql())
    }

    fn create_sql(&self) -> String {
        let mut sql = String::from("CREATE ");
        if self.or_replace {
            sql.push_str("OR REPLACE ");
        }
        sql.push_str("TRIGGER ");
        sql.push_str(&quote::ident(&self.common.name.name));
        sql.push(' ');
        sql.push_str(&self.timing.to_ascii_uppercase());
        let events: Vec<String> = self.events.iter().map(|e| e.to_ascii_uppercase()).collect();
        sql.push(' ');
        sql.push_str(&events.join(" OR "));
        sql.push_str(" ON ");
        sql.push_str(&self.table.sql());
        if self.for_each_row {
            sql.push_str(" FOR EACH ROW");
        }
        if let Some(when) = &self.when {
            sql.push_str(&format!(" WHEN ({when})"));
        }
        sql.push_str(" EXECUTE FUNCTION ");
        sql.push_str(&self.function.sql());
        if self.function.signature.is_none() {
            sql.push_str("()");
        }
        sql
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        let pick_name = |key: &str| {
            CREATE_TRIGGER
                .pick(map, key)
                .and_then(Value::as_text)
                .map(QualifiedName::parse)
                .unwrap_or_else(|| QualifiedName::local(""))
        };
        Self {
            common: OpCommon::from_fields(map),
            table: pick_name("table"),
            timing: map
                .get_text("timing")
                .unwrap_or("after")
                .to_ascii_lowercase(),
            events: map.get_texts("events"),
            function: pick_name("function"),
            for_each_row: CREATE_TRIGGER
                .pick(map, "for_each_row")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            when: map.get_text("when").map(str::to_string),
            or_replace: CREATE_TRIGGER
                .pick(map, "or_replace")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            from_statement: map.get_text("from_statement").map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        map.insert("table", Value::text(self.table.normalized()));
        self.common.write_fields(map);
        if self.timing != "after" {
            map.insert("timing", Value::text(self.timing.clone()));
        }
        let mut events = self.events.clone();
        events.sort();
        events.dedup();
        map.insert("events", Value::texts(events));
        map.insert("function", Value::text(self.function.normalized()));
        if !self.for_each_row {
            map.insert("for_each_row", Value::Bool(false));
        }
        if let Some(when) = &self.when {
            map.insert("when", Value::text(when.clone()));
        }
        if self.or_replace {
            map.insert("or_replace", Value::Bool(true));
        }
        if let Some(statement) = &self.from_statement {
            map.insert("from_statement", Value::text(statement.clone()));
        }
    }
}

/// `DROP TRIGGER`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTrigger {
    /// Shared fields; `name` is the trigger's (table-local) name.
    pub common: OpCommon,
    /// Table the trigger fires on.
    pub table: QualifiedName,
    /// Shadow of the original creation statement; required for inversion.
    pub from_statement: Option<String>,
}

impl DropTrigger {
    /// Creates the operation with no shadow state.
    #[must_use]
    pub fn new(table: QualifiedName, name: impl Into<String>) -> Self {
        Self {
            common: OpCommon::named(QualifiedName::local(name.into())),
            table,
            from_statement: None,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.require("table", !self.table.is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let mut reasons = drop_guards(&self.common);
        if self.from_statement.is_none() {
            reasons.push(Reason::missing_shadow("statement"));
        }
        if !reasons.is_empty() {
            return Err(reasons);
        }
        Ok(Some(Operation::RawSql(RawSql {
            up: self.from_statement.clone().unwrap_or_default(),
            down: Some(self.sql()),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("DROP TRIGGER ");
        if self.common.if_exists {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&quote::ident(&self.common.name.name));
        sql.push_str(" ON ");
        sql.push_str(&self.table.sql());
        sql.push_str(self.common.force.sql_suffix());
        sql
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            table: DROP_TRIGGER
                .pick(map, "table")
                .and_then(Value::as_text)
                .map(QualifiedName::parse)
                .unwrap_or_else(|| QualifiedName::local("")),
            from_statement: map.get_text("from_statement").map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        map.insert("table", Value::text(self.table.normalized()));
        self.common.write_fields(map);
        if let Some(statement) = &self.from_statement {
            map.insert("from_statement", Value::text(statement.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invert::ReasonKind;

    fn touch_trigger() -> CreateTrigger {
        let mut op = CreateTrigger::new(
            QualifiedName::parse("public.users"),
            "users_touch",
            ["update", "insert"],
            QualifiedName::parse("public.touch_updated_at"),
        );
        op.timing = "before".to_string();
        op
    }

    #[test]
    fn test_events_sorted_and_uppercased() {
        let op = touch_trigger();
        assert_eq!(op.events, vec!["insert", "update"]);
        assert_eq!(
            op.sql(ServerVersion::V12).unwrap(),
            "CREATE TRIGGER users_touch BEFORE INSERT OR UPDATE ON public.users \
             FOR EACH ROW EXECUTE FUNCTION public.touch_updated_at()"
        );
    }

    #[test]
    fn test_or_replace_gated_on_v14() {
        let mut op = touch_trigger();
        op.or_replace = true;
        let err = op.sql(ServerVersion::V12).unwrap_err();
        match err {
            Error::UnsupportedAtVersion {
                required, actual, ..
            } => {
                assert_eq!(required, ServerVersion::V14);
                assert_eq!(actual, ServerVersion::V12);
            }
            other => panic!("expected UnsupportedAtVersion, got {other}"),
        }
        assert!(op.sql(ServerVersion::V14).is_ok());
    }

    #[test]
    fn test_invalid_timing_and_event_rejected() {
        let mut op = touch_trigger();
        op.timing = "around".to_string();
        op.events.push("upsert".to_string());
        let mut c = Checker::new();
        op.rules(&mut c);
        let errors = c.finish();
        assert!(errors.iter().any(|e| e.field == "timing"));
        assert!(errors.iter().any(|e| e.field == "events"));
    }

    #[test]
    fn test_create_inverts_to_drop_with_statement_shadow() {
        let op = touch_trigger();
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::DropTrigger(drop) => {
                assert_eq!(drop.common.name.name, "users_touch");
                assert!(drop
                    .from_statement
                    .as_deref()
                    .unwrap()
                    .starts_with("CREATE TRIGGER users_touch"));
            }
            other => panic!("expected DropTrigger, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_replace_inverts_through_raw_statement() {
        let mut op = touch_trigger();
        op.or_replace = true;
        op.from_statement = Some("CREATE TRIGGER users_touch ...".to_string());
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::RawSql(raw) => {
                assert_eq!(raw.up, "CREATE TRIGGER users_touch ...");
                assert!(raw.down.unwrap().starts_with("CREATE OR REPLACE TRIGGER"));
            }
            other => panic!("expected RawSql, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_drop_without_statement_shadow() {
        let op = DropTrigger::new(QualifiedName::parse("public.users"), "users_touch");
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons[0].kind, ReasonKind::MissingPreviousValueShadow);
    }
}
