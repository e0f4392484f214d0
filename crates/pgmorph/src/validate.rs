//! Declarative validation.
//!
//! Rules accumulate structured `(field, message)` pairs on a [`Checker`];
//! evaluation has no side effects and never panics. `validate_or_fail`
//! wraps the collected list into [`crate::error::Error::Validation`].

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// One violated rule: the offending field and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Declared field the rule belongs to.
    pub field: String,
    /// What the rule expected.
    pub message: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Accumulates rule violations in declaration order.
#[derive(Debug, Default)]
pub struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    /// Creates an empty checker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Presence rule.
    pub fn require(&mut self, field: &str, present: bool) {
        if !present {
            self.errors.push(FieldError::new(field, "must be present"));
        }
    }

    /// Absence rule, for attributes a kind does not accept.
    pub fn forbid(&mut self, field: &str, absent: bool) {
        if !absent {
            self.errors
                .push(FieldError::new(field, "is not accepted by this operation"));
        }
    }

    /// Inclusion-in-set rule.
    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.errors.push(FieldError::new(
                field,
                format!("must be one of [{}], got '{value}'", allowed.join(", ")),
            ));
        }
    }

    /// Numeric range rule.
    pub fn in_range(&mut self, field: &str, value: i64, range: RangeInclusive<i64>) {
        if !range.contains(&value) {
            self.errors.push(FieldError::new(
                field,
                format!(
                    "must be between {} and {}, got {value}",
                    range.start(),
                    range.end()
                ),
            ));
        }
    }

    /// Custom predicate rule.
    pub fn ensure(&mut self, field: &str, ok: bool, message: &str) {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
    }

    /// The collected violations, in rule declaration order.
    #[must_use]
    pub fn finish(self) -> Vec<FieldError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_and_forbid() {
        let mut checker = Checker::new();
        checker.require("name", false);
        checker.forbid("cascade", false);
        checker.require("table", true);

        let errors = checker.finish();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "name");
        assert_eq!(errors[1].field, "cascade");
    }

    #[test]
    fn test_one_of() {
        let mut checker = Checker::new();
        checker.one_of("timing", "before", &["before", "after", "instead of"]);
        checker.one_of("timing", "sometimes", &["before", "after"]);

        let errors = checker.finish();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("sometimes"));
    }

    #[test]
    fn test_in_range() {
        let mut checker = Checker::new();
        checker.in_range("columns", 0, 1..=32);
        let errors = checker.finish();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("between 1 and 32"));
    }

    #[test]
    fn test_collects_in_order() {
        let mut checker = Checker::new();
        checker.ensure("a", false, "first");
        checker.ensure("b", false, "second");
        let errors = checker.finish();
        assert_eq!(errors[0].message, "first");
        assert_eq!(errors[1].message, "second");
    }
}
