//! Function operations.
//!
//! Function names carry an argument-signature suffix so overloads stay
//! distinguishable; bodies are dollar-quoted with collision-safe tags.

use serde::{Deserialize, Serialize};

use crate::fields::{FieldDescriptor, FieldType, KindDescriptor, OpCommon};
use crate::ident::QualifiedName;
use crate::invert::{drop_guards, Reason};
use crate::quote;
use crate::validate::Checker;
use crate::value::{FieldMap, Value};

use super::{comment_sql, Operation};

pub(crate) const CREATE_FUNCTION: KindDescriptor = KindDescriptor {
    keyword: "create_function",
    positional: &["name"],
    fields: &[
        FieldDescriptor {
            name: "returns",
            aliases: &[],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "language",
            aliases: &[],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "body",
            aliases: &["as"],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "or_replace",
            aliases: &["replace"],
            ftype: FieldType::Bool,
        },
        FieldDescriptor {
            name: "from_body",
            aliases: &[],
            ftype: FieldType::Text,
        },
    ],
};

pub(crate) const DROP_FUNCTION: KindDescriptor = KindDescriptor {
    keyword: "drop_function",
    positional: &["name"],
    fields: &[
        FieldDescriptor {
            name: "from_returns",
            aliases: &[],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "from_language",
            aliases: &[],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "from_body",
            aliases: &[],
            ftype: FieldType::Text,
        },
    ],
};

/// `CREATE [OR REPLACE] FUNCTION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFunction {
    /// Shared fields; `name` should carry the argument signature.
    pub common: OpCommon,
    /// Return type, raw type text.
    pub returns: String,
    /// Implementation language.
    pub language: String,
    /// Function body, dollar-quoted on render.
    pub body: String,
    /// Replace an existing definition in place.
    pub or_replace: bool,
    /// Shadow of the replaced body; required to invert a replace.
    pub from_body: Option<String>,
}

impl CreateFunction {
    /// Creates the operation.
    #[must_use]
    pub fn new(
        name: QualifiedName,
        returns: impl Into<String>,
        language: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            common: OpCommon::named(name),
            returns: returns.into(),
            language: language.into(),
            body: body.into(),
            or_replace: false,
            from_body: None,
        }
    }

    /// Switches to replace-in-place with the previous body as shadow.
    #[must_use]
    pub fn or_replace(mut self, from_body: Option<String>) -> Self {
        self.or_replace = true;
        self.from_body = from_body;
        self
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.require("returns", !self.returns.trim().is_empty());
        c.require("language", !self.language.trim().is_empty());
        c.require("body", !self.body.trim().is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("if_exists", !self.common.if_exists);
        c.forbid("cascade", !self.common.force.is_cascade());
        c.forbid("to", self.common.new_name.is_none());
        c.ensure(
            "from_body",
            self.or_replace || self.from_body.is_none(),
            "only meaningful together with or_replace",
        );
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        if self.or_replace {
            let Some(from_body) = &self.from_body else {
                return Err(vec![Reason::replace_without_prior(format!(
                    "function '{}' was replaced but the previous body was not supplied",
                    self.common.name
                ))]);
            };
            let mut common = OpCommon::named(self.common.name.clone());
            common.comment = self.common.comment.clone();
            return Ok(Some(Operation::CreateFunction(CreateFunction {
                common,
                returns: self.returns.clone(),
                language: self.language.clone(),
                body: from_body.clone(),
                or_replace: true,
                from_body: Some(self.body.clone()),
            })));
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::DropFunction(DropFunction {
            common,
            from_returns: Some(self.returns.clone()),
            from_language: Some(self.language.clone()),
            from_body: Some(self.body.clone()),
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("CREATE ");
        if self.or_replace {
            sql.push_str("OR REPLACE ");
        }
        sql.push_str("FUNCTION ");
        sql.push_str(&self.common.name.sql());
        if self.common.name.signature.is_none() {
            sql.push_str("()");
        }
        sql.push_str(" RETURNS ");
        sql.push_str(&self.returns);
        sql.push_str(" LANGUAGE ");
        sql.push_str(&self.language);
        sql.push_str(" AS ");
        sql.push_str(&quote::dollar_body(&self.body));
        if let Some(comment) = &self.common.comment {
            sql.push_str(";\n");
            sql.push_str(&comment_sql("FUNCTION", &self.common.name, Some(comment)));
        }
        sql
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            common: OpCommon::from_fields(map),
            returns: map.get_text("returns").unwrap_or_default().to_string(),
            language: map.get_text("language").unwrap_or_default().to_string(),
            body: CREATE_FUNCTION
                .pick(map, "body")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string(),
            or_replace: CREATE_FUNCTION
                .pick(map, "or_replace")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            from_body: map.get_text("from_body").map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        map.insert("returns", Value::text(self.returns.clone()));
        map.insert("language", Value::text(self.language.clone()));
        map.insert("body", Value::text(self.body.clone()));
        if self.or_replace {
            map.insert("or_replace", Value::Bool(true));
        }
        if let Some(from_body) = &self.from_body {
            map.insert("from_body", Value::text(from_body.clone()));
        }
    }
}

/// `DROP FUNCTION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropFunction {
    /// Shared fields; `name` should carry the argument signature.
    pub common: OpCommon,
    /// Shadow of the return type.
    pub from_returns: Option<String>,
    /// Shadow of the language.
    pub from_language: Option<String>,
    /// Shadow of the body.
    pub from_body: Option<String>,
}

impl DropFunction {
    /// Creates the operation with no shadow state.
    #[must_use]
    pub fn new(name: QualifiedName) -> Self {
        Self {
            common: OpCommon::named(name),
            from_returns: None,
            from_language: None,
            from_body: None,
        }
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("name", !self.common.name.is_empty());
        c.forbid("if_not_exists", !self.common.if_not_exists);
        c.forbid("to", self.common.new_name.is_none());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        let mut reasons = drop_guards(&self.common);
        if self.from_returns.is_none() {
            reasons.push(Reason::missing_shadow("returns"));
        }
        if self.from_language.is_none() {
            reasons.push(Reason::missing_shadow("language"));
        }
        if self.from_body.is_none() {
            reasons.push(Reason::missing_shadow("body"));
        }
        if !reasons.is_empty() {
            return Err(reasons);
        }
        let mut common = OpCommon::named(self.common.name.clone());
        common.comment = self.common.comment.clone();
        Ok(Some(Operation::CreateFunction(CreateFunction {
            common,
            returns: self.from_returns.clone().unwrap_or_default(),
            language: self.from_language.clone().unwrap_or_default(),
            body: self.from_body.clone().unwrap_or_default(),
            or_replace: false,
            from_body: None,
        })))
    }

    pub(crate) fn sql(&self) -> String {
        let mut sql = String::from("DROP FUNCTION ");
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
            from_returns: map.get_text("from_returns").map(str::to_string),
            from_language: map.get_text("from_language").map(str::to_string),
            from_body: map.get_text("from_body").map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        self.common.write_fields(map);
        if let Some(returns) = &self.from_returns {
            map.insert("from_returns", Value::text(returns.clone()));
        }
        if let Some(language) = &self.from_language {
            map.insert("from_language", Value::text(language.clone()));
        }
        if let Some(body) = &self.from_body {
            map.insert("from_body", Value::text(body.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invert::ReasonKind;

    fn touch() -> QualifiedName {
        QualifiedName::parse("public.touch_updated_at()")
    }

    #[test]
    fn test_create_function_sql() {
        let op = CreateFunction::new(
            touch(),
            "trigger",
            "plpgsql",
            "BEGIN NEW.updated_at = now(); RETURN NEW; END;",
        );
        assert_eq!(
            op.sql(),
            "CREATE FUNCTION public.touch_updated_at() RETURNS trigger LANGUAGE plpgsql \
             AS $fn$BEGIN NEW.updated_at = now(); RETURN NEW; END;$fn$"
        );
    }

    #[test]
    fn test_signature_appended_when_missing() {
        let op = CreateFunction::new(QualifiedName::parse("public.noop"), "void", "sql", "SELECT 1");
        assert!(op.sql().starts_with("CREATE FUNCTION public.noop()"));
    }

    #[test]
    fn test_replace_without_prior_body() {
        let op = CreateFunction::new(touch(), "trigger", "plpgsql", "BEGIN END;").or_replace(None);
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons[0].kind, ReasonKind::ReplaceWithoutPriorState);
    }

    #[test]
    fn test_drop_collects_every_missing_shadow() {
        let mut op = DropFunction::new(touch());
        op.from_body = Some("BEGIN END;".to_string());
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].mentions("returns"));
        assert!(reasons[1].mentions("language"));
    }

    #[test]
    fn test_full_shadow_drop_inverts_to_create() {
        let mut op = DropFunction::new(touch());
        op.from_returns = Some("trigger".to_string());
        op.from_language = Some("plpgsql".to_string());
        op.from_body = Some("BEGIN END;".to_string());
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::CreateFunction(create) => {
                assert_eq!(create.language, "plpgsql");
                assert_eq!(create.body, "BEGIN END;");
            }
            other => panic!("expected CreateFunction, got {:?}", other.kind()),
        }
    }
}
