//! View operations.

use serde::{Deserialize, Serialize};

use crate::fields::{FieldDescriptor, FieldType, KindDescriptor, OpCommon};
use crate::ident::QualifiedName;
use crate::invert::{drop_guards, Reason};
use crate::validate::Checker;
use crate::value::{FieldMap, Value};

use super::{comment_sql, Operation};

pub(crate) const CREATE_VIEW: KindDescriptor = KindDescriptor {
    keyword: "create_view",
    positional: &["name"],
    fields: &[
        FieldDescriptor {
            name: "query",
            aliases: &["as"],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "or_replace",
            aliases: &["replace"],
            ftype: FieldType::Bool,
        },
        FieldDescriptor {
            name: "from_query",
            aliases: &[],
            ftype: FieldType::Text,
        },
    ],
};

pub(crate) const DROP_VIEW: KindDescriptor = KindDescriptor {
    keyword: "drop_view",
    positional: &["name"],
    fields: &[FieldDescriptor {
        name: "from_query",
        aliases: &[],
        ftype: FieldType::Text,
    }],
};

/// `CREATE [OR REPLACE] VIEW`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateView {
    /// Shared fields.
    pub common: OpCommon,
    /// The defining query, raw SQL text.
    pub query: String,
    /// Replace an existing definition in place.
    pub or_replace: bool,
    /// Shadow of the replaced definition; required to invert a replace.
    pub from_query: Option<String>,
}

impl CreateView {
    /// Creates the operation.
    #[must_use]
    pub fn new(name: QualifiedName, query: impl Into<String>) -> Self {
        Self {
            common: OpCommon::named(name),
            query: query.into(),
            or_replace: false,
            from_query: None,
        }
    }

    /// Switches to replace-in-place; `from_query` is the shadow of the
    /// definition being replaced.
    #[must_use]
    pub fn or_replace(mut self, from_query: Option<String>) -> Self {
        self.or_replace = true;
        self.from_query = from_query;
        self
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.require("query", !self.query.trim().is_empty());
        // Views have no IF NOT EXISTS form.
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
        c.ensure(
            "from_query",
            self.or_replace || self.from_query.is_none(),
            "only meaningful together with or_replace",
        );
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        if self.or_replace {
            let Some(from_query) = &self.from_query else {
                return Err(vec![Reason::replace_without_prior(format!(
                    "view '{}' was replaced but the previous definition was not supplied",
                    self.common.name
                ))]);
            };
            let mut common = OpCommon::named(self.common.name.clone());
            common.comment = self.common.comment.clone();
            return Ok(Some(Operation::CreateView(CreateView {
                common,
                query: from_query.clone(),
                or_replace: true,
                from_query: Some(self.query.clone()),
            })));
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::DropView(DropView {
            common,
            from_query: Some(self.query.clone()),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("CREATE ");
        if self.or_replace {
            sql.push_str("OR REPLACE ");
        }
        sql.push_str("VIEW ");
        sql.push_str(&self.common.name.sql());
        sql.push_str(" AS\n");
        sql.push_str(&self.query);
        if let Some(comment) = &self.common.comment {
            sql.push_str(";\n");
            sql.push_str(&comment_sql("VIEW", &self.common.name, Some(comment)));
        }
        sql
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            query: CREATE_VIEW
                .pick(map, "query")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string(),
            or_replace: CREATE_VIEW
                .pick(map, "or_replace")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            from_query: map.get_text("from_query").map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        map.insert("query", Value::text(self.query.clone()));
        if self.or_replace {
            map.insert("or_replace", Value::Bool(true));
        }
        if let Some(from_query) = &self.from_query {
            map.insert("from_query", Value::text(from_query.clone()));
        }
    }
}

/// `DROP VIEW`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropView {
    /// Shared fields.
    pub common: OpCommon,
    /// Shadow of the dropped definition; required for inversion.
    pub from_query: Option<String>,
}

impl DropView {
    /// Creates the operation with no shadow state.
    #[must_use]
    pub fn new(name: QualifiedName) -> Self {
        Self {
            common: OpCommon::named(name),
            from_query: None,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let mut reasons = drop_guards(&self.common);
        if self.from_query.is_none() {
            reasons.push(Reason::missing_shadow("query"));
        }
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::CreateView(CreateView {
            common,
            query: self.from_query.clone().unwrap_or_default(),
            or_replace: false,
            from_query: None,
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("DROP VIEW ");
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
            from_query: map.get_text("from_query").map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        if let Some(from_query) = &self.from_query {
            map.insert("from_query", Value::text(from_query.clone()));
        }
    }
}
