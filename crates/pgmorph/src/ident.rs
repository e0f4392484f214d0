//! Object identity: catalog oids and qualified names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::quote;

/// Opaque numeric catalog identity, assigned by the database after a
/// forward operation executes. Absent before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Oid(pub u32);

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Two-part identifier (namespace + local name), optionally carrying an
/// argument signature suffix for routine-like objects.
///
/// Comparison, equality and hashing all operate on the normalized form, so
/// `Public.Users` and `public.users` name the same object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Schema/namespace part, when qualified.
    pub namespace: Option<String>,
    /// Local object name.
    pub name: String,
    /// Argument signature suffix, e.g. `(integer, text)`.
    pub signature: Option<String>,
}

impl QualifiedName {
    /// Creates a namespace-qualified name.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
            signature: None,
        }
    }

    /// Creates an unqualified (local) name.
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            signature: None,
        }
    }

    /// Attaches an argument signature suffix.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Parses `schema.name` or `schema.name(args)` text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (head, signature) = match text.find('(') {
            Some(at) => (&text[..at], Some(text[at..].to_string())),
            None => (text, None),
        };
        let (namespace, name) = match head.split_once('.') {
            Some((ns, local)) => (Some(ns.to_string()), local.to_string()),
            None => (None, head.to_string()),
        };
        Self {
            namespace,
            name,
            signature,
        }
    }

    /// Whether the local name is missing. Used by the presence rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// The normalized textual form: lowercased parts, signature whitespace
    /// collapsed. All comparisons go through this.
    #[must_use]
    pub fn normalized(&self) -> String {
        let mut out = String::new();
        if let Some(ns) = &self.namespace {
            out.push_str(&ns.trim().to_ascii_lowercase());
            out.push('.');
        }
        out.push_str(&self.name.trim().to_ascii_lowercase());
        if let Some(sig) = &self.signature {
            let collapsed: Vec<&str> = sig.split_whitespace().collect();
            out.push_str(&collapsed.join(" ").to_ascii_lowercase());
        }
        out
    }

    /// Whether this name meaningfully differs from `other` after
    /// normalization. Used both for rename validation and to detect
    /// caller-supplied names that differ from an auto-generated pattern.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.normalized() != other.normalized()
    }

    /// The normalized local component alone, namespace and signature
    /// ignored.
    #[must_use]
    pub fn local_normalized(&self) -> String {
        self.name.trim().to_ascii_lowercase()
    }

    /// Whether `other` names a different explicit namespace. A name
    /// without a namespace stays where it is, so it never crosses.
    #[must_use]
    pub fn crosses_namespace(&self, other: &Self) -> bool {
        match (&self.namespace, &other.namespace) {
            (Some(a), Some(b)) => a.trim().to_ascii_lowercase() != b.trim().to_ascii_lowercase(),
            _ => false,
        }
    }

    /// The SQL form: each part quoted when needed, signature appended as-is.
    #[must_use]
    pub fn sql(&self) -> String {
        let mut out = String::new();
        if let Some(ns) = &self.namespace {
            out.push_str(&quote::ident(ns));
            out.push('.');
        }
        out.push_str(&quote::ident(&self.name));
        if let Some(sig) = &self.signature {
            out.push_str(sig);
        }
        out
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl PartialEq for QualifiedName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for QualifiedName {}

impl Hash for QualifiedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl PartialOrd for QualifiedName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QualifiedName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().cmp(&other.normalized())
    }
}
