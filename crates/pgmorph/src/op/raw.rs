//! Verbatim SQL escape hatch.

use serde::{Deserialize, Serialize};

use crate::fields::{FieldDescriptor, FieldType, KindDescriptor};
use crate::invert::Reason;
use crate::validate::Checker;
use crate::value::{FieldMap, Value};

use super::Operation;

pub(crate) const RAW_SQL: KindDescriptor = KindDescriptor {
    keyword: "sql",
    positional: &["up"],
    fields: &[
        FieldDescriptor {
            name: "up",
            aliases: &["run"],
            ftype: FieldType::Text,
        },
        FieldDescriptor {
            name: "down",
            aliases: &["undo"],
            ftype: FieldType::Text,
        },
    ],
};

/// Verbatim SQL with an optional hand-written inverse.
///
/// The only kind without a name: raw statements have no catalog identity,
/// cannot be depended on and sort by their forward text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSql {
    /// Forward statement text, emitted verbatim.
    pub up: String,
    /// Hand-written inverse; its absence makes the operation irreversible.
    pub down: Option<String>,
}

impl RawSql {
    /// Creates a forward-only raw statement.
    #[must_use]
    pub fn new(up: impl Into<String>) -> Self {
        Self {
            up: up.into(),
            down: None,
        }
    }

    /// Attaches the hand-written inverse.
    #[must_use]
    pub fn down(mut self, down: impl Into<String>) -> Self {
        self.down = Some(down.into());
        self
    }

    pub(crate) fn rules(&self, c: &mut Checker) {
        c.require("up", !self.up.trim().is_empty());
    }

    pub(crate) fn invert(&self) -> Result<Option<Operation>, Vec<Reason>> {
        match &self.down {
            Some(down) => Ok(Some(Operation::RawSql(RawSql {
                up: down.clone(),
                down: Some(self.up.clone()),
            }))),
            None => Err(vec![Reason::missing_shadow("down")]),
        }
    }

    pub(crate) fn sql(&self) -> String {
        self.up.clone()
    }

    pub(crate) fn from_fields(map: &FieldMap) -> Self {
        Self {
            up: RAW_SQL
                .pick(map, "up")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string(),
            down: RAW_SQL
                .pick(map, "down")
                .and_then(Value::as_text)
                .map(str::to_string),
        }
    }

    pub(crate) fn write_fields(&self, map: &mut FieldMap) {
        map.insert("up", Value::text(self.up.clone()));
        if let Some(down) = &self.down {
            map.insert("down", Value::text(down.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invert::ReasonKind;

    #[test]
    fn test_invert_swaps_directions() {
        let op = RawSql::new("GRANT SELECT ON users TO reporting")
            .down("REVOKE SELECT ON users FROM reporting");
        let inverse = op.invert().unwrap().unwrap();
        match inverse {
            Operation::RawSql(raw) => {
                assert_eq!(raw.up, "REVOKE SELECT ON users FROM reporting");
                assert_eq!(raw.down.as_deref(), Some("GRANT SELECT ON users TO reporting"));
            }
            other => panic!("expected RawSql, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_missing_down_is_irreversible() {
        let op = RawSql::new("GRANT SELECT ON users TO reporting");
        let reasons = op.invert().unwrap_err();
        assert_eq!(reasons[0].kind, ReasonKind::MissingPreviousValueShadow);
        assert!(reasons[0].mentions("down"));
    }

    #[test]
    fn test_empty_up_rejected() {
        let op = RawSql::new("  ");
        let mut c = Checker::new();
        op.rules(&mut c);
        assert_eq!(c.finish().len(), 1);
    }
}
