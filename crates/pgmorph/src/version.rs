//! PostgreSQL server version handling.
//!
//! Versions use the numeric catalog form (`major * 10000 + minor`), the same
//! value `SHOW server_version_num` reports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A PostgreSQL server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion(pub u32);

impl ServerVersion {
    /// PostgreSQL 10, first version with `ADD VALUE ... BEFORE/AFTER`.
    pub const V10: Self = Self(100_000);
    /// PostgreSQL 12.
    pub const V12: Self = Self(120_000);
    /// PostgreSQL 14, first version with `CREATE OR REPLACE TRIGGER`.
    pub const V14: Self = Self(140_000);
    /// PostgreSQL 16.
    pub const V16: Self = Self(160_000);

    /// Builds a version from a major release number.
    #[must_use]
    pub fn from_major(major: u32) -> Self {
        Self(major * 10_000)
    }

    /// Major release number.
    #[must_use]
    pub fn major(self) -> u32 {
        self.0 / 10_000
    }

    /// Minor release number.
    #[must_use]
    pub fn minor(self) -> u32 {
        self.0 % 10_000
    }

    /// Parses `"14"`, `"14.2"` or the raw numeric form `"140002"`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some((major, minor)) = text.split_once('.') {
            let major: u32 = major.parse().ok()?;
            let minor: u32 = minor.parse().ok()?;
            return Some(Self(major * 10_000 + minor));
        }
        let number: u32 = text.parse().ok()?;
        if number >= 100_000 {
            Some(Self(number))
        } else {
            Some(Self::from_major(number))
        }
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major() {
        assert_eq!(ServerVersion::from_major(14), ServerVersion(140_000));
        assert_eq!(ServerVersion::V14.major(), 14);
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(ServerVersion::parse("14"), Some(ServerVersion::V14));
        assert_eq!(ServerVersion::parse("14.2"), Some(ServerVersion(140_002)));
        assert_eq!(ServerVersion::parse("140002"), Some(ServerVersion(140_002)));
        assert_eq!(ServerVersion::parse("bogus"), None);
    }

    #[test]
    fn test_ordering() {
        assert!(ServerVersion::V12 < ServerVersion::V14);
        assert!(ServerVersion::parse("14.2").unwrap() > ServerVersion::V14);
    }

    #[test]
    fn test_display() {
        assert_eq!(ServerVersion::V14.to_string(), "14.0");
        assert_eq!(ServerVersion(140_002).to_string(), "14.2");
    }
}
