//! The inversion protocol: categorized irreversibility reasons and the
//! guards shared by whole families of operation kinds.
//!
//! Per-kind inversion lives next to each kind; this module fixes the
//! taxonomy so callers and tests can match on categories instead of
//! message text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fields::OpCommon;

/// Canonical irreversibility categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonKind {
    /// A cascade/if-exists flag made the prior state unrecoverable.
    DestructiveFlagUsed,
    /// A replace-in-place flag was used but no previous definition is known.
    ReplaceWithoutPriorState,
    /// A field changed but its previous-value shadow was not supplied.
    MissingPreviousValueShadow,
    /// The database fundamentally cannot undo this class of change.
    StructurallyOneWay,
}

/// One categorized, human-readable reason inversion failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    /// Category, stable across message wording.
    pub kind: ReasonKind,
    /// What exactly is unrecoverable.
    pub detail: String,
}

impl Reason {
    /// A destructive flag discarded state.
    #[must_use]
    pub fn destructive(detail: impl Into<String>) -> Self {
        Self {
            kind: ReasonKind::DestructiveFlagUsed,
            detail: detail.into(),
        }
    }

    /// Replace-in-place without a known prior definition.
    #[must_use]
    pub fn replace_without_prior(detail: impl Into<String>) -> Self {
        Self {
            kind: ReasonKind::ReplaceWithoutPriorState,
            detail: detail.into(),
        }
    }

    /// A changed field whose `from_` shadow is missing.
    #[must_use]
    pub fn missing_shadow(field: &str) -> Self {
        Self {
            kind: ReasonKind::MissingPreviousValueShadow,
            detail: format!("'{field}' changed but no prior value was supplied"),
        }
    }

    /// A change the engine cannot undo at all.
    #[must_use]
    pub fn one_way(detail: impl Into<String>) -> Self {
        Self {
            kind: ReasonKind::StructurallyOneWay,
            detail: detail.into(),
        }
    }

    /// Whether the detail text mentions `needle` (test helper).
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.detail.contains(needle)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            ReasonKind::DestructiveFlagUsed => "destructive flag",
            ReasonKind::ReplaceWithoutPriorState => "replaced without prior state",
            ReasonKind::MissingPreviousValueShadow => "missing previous value",
            ReasonKind::StructurallyOneWay => "structurally one-way",
        };
        write!(f, "{prefix}: {}", self.detail)
    }
}

/// Guards shared by every drop-like kind: destructive flags always defeat
/// inversion, regardless of any other field.
#[must_use]
pub fn drop_guards(common: &OpCommon) -> Vec<Reason> {
    let mut reasons = Vec::new();
    if common.force.is_cascade() {
        reasons.push(Reason::destructive(
            "cascade discards dependent objects that cannot be reconstructed",
        ));
    }
    if common.if_exists {
        reasons.push(Reason::destructive(
            "if_exists hides whether the object existed before the drop",
        ));
    }
    reasons
}

/// Guards shared by every create-like kind.
#[must_use]
pub fn create_guards(common: &OpCommon) -> Vec<Reason> {
    let mut reasons = Vec::new();
    if common.if_not_exists {
        reasons.push(Reason::destructive(
            "if_not_exists hides whether the object already existed before the create",
        ));
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Force;
    use crate::ident::QualifiedName;

    #[test]
    fn test_cascade_guard() {
        let mut common = OpCommon::named(QualifiedName::parse("public.users"));
        common.force = Force::Cascade;

        let reasons = drop_guards(&common);
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].kind, ReasonKind::DestructiveFlagUsed);
        assert!(reasons[0].mentions("cascade"));
    }

    #[test]
    fn test_if_exists_guard() {
        let mut common = OpCommon::named(QualifiedName::parse("public.users"));
        common.if_exists = true;

        let reasons = drop_guards(&common);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].mentions("if_exists"));
    }

    #[test]
    fn test_both_drop_guards_collected() {
        let mut common = OpCommon::named(QualifiedName::parse("public.users"));
        common.force = Force::Cascade;
        common.if_exists = true;
        assert_eq!(drop_guards(&common).len(), 2);
    }

    #[test]
    fn test_clean_drop_passes() {
        let common = OpCommon::named(QualifiedName::parse("public.users"));
        assert!(drop_guards(&common).is_empty());
        assert!(create_guards(&common).is_empty());
    }

    #[test]
    fn test_missing_shadow_names_field() {
        let reason = Reason::missing_shadow("comment");
        assert_eq!(reason.kind, ReasonKind::MissingPreviousValueShadow);
        assert!(reason.mentions("comment"));
        assert!(reason.to_string().starts_with("missing previous value"));
    }
}
