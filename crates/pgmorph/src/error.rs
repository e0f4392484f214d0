//! Error types for the operation engine.

use crate::invert::Reason;
use crate::validate::FieldError;
use crate::version::ServerVersion;

/// Errors that can occur while validating, inverting, rendering or
/// resolving schema operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more declared invariants were violated before any database
    /// interaction took place.
    #[error("Validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<FieldError>),

    /// Inversion was requested but no logical inverse exists.
    #[error("Operation is not reversible:\n{}", .0.iter().map(|r| format!("  - {}", r)).collect::<Vec<_>>().join("\n"))]
    Irreversible(Vec<Reason>),

    /// Rendering was requested against a server version that lacks the
    /// needed capability. Detected before any text is produced.
    #[error("'{feature}' requires PostgreSQL {required}, target is {actual}")]
    UnsupportedAtVersion {
        /// The capability that is missing.
        feature: String,
        /// Minimum server version providing the capability.
        required: ServerVersion,
        /// The requested target version.
        actual: ServerVersion,
    },

    /// The dependency relation contains a cycle; the resolver fails closed
    /// instead of recursing forever.
    #[error("Dependency cycle detected at '{object}'")]
    CycleDetected {
        /// A member of the detected cycle.
        object: String,
    },

    /// A canonical snippet could not be parsed back into operations.
    #[error("Snippet parse error at line {line}: {message}")]
    Snippet {
        /// One-based line number of the offending input.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// Opaque pass-through from the execution collaborator. Never
    /// interpreted, retried or classified further.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading snippet files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The irreversibility reasons carried by this error, if any.
    #[must_use]
    pub fn reasons(&self) -> &[Reason] {
        match self {
            Self::Irreversible(reasons) => reasons,
            _ => &[],
        }
    }
}

/// Result type for operation-engine functions.
pub type Result<T> = std::result::Result<T, Error>;
