//! Package identifiers and update-list records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Separator between package name and version in an identifier.
pub const ID_SEPARATOR: char = '=';

/// Composite package identifier of the form `name=version`.
///
/// The identifier is split on the first `=`: the name is everything
/// before it and must not be empty, the version is everything after it
/// and must not be empty either. Versions may themselves contain `=`
/// (e.g. `"x-activity=2=1"` has name `x-activity` and version `2=1`),
/// so `name + "=" + version` always reproduces the original string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId {
    raw: String,
    split: usize,
}

impl PackageId {
    /// Parses and validates a `name=version` identifier.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPackageId` if there is no separator,
    /// or if either side of it is empty.
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let raw = value.into();
        match raw.find(ID_SEPARATOR) {
            Some(split) if split > 0 && split + 1 < raw.len() => Ok(Self { raw, split }),
            _ => Err(DomainError::InvalidPackageId { value: raw }),
        }
    }

    /// Builds an identifier from its parts.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPackageId` if the name is empty or
    /// contains the separator, or if the version is empty.
    pub fn from_parts(name: &str, version: &str) -> DomainResult<Self> {
        if name.contains(ID_SEPARATOR) {
            return Err(DomainError::InvalidPackageId {
                value: format!("{name}{ID_SEPARATOR}{version}"),
            });
        }
        Self::parse(format!("{name}{ID_SEPARATOR}{version}"))
    }

    /// Package name (left of the first `=`).
    pub fn name(&self) -> &str {
        self.raw.get(..self.split).unwrap_or_default()
    }

    /// Package version (right of the first `=`).
    pub fn version(&self) -> &str {
        self.raw.get(self.split + 1..).unwrap_or_default()
    }

    /// Returns the full identifier string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if the package name ends with the given installable-content suffix.
    #[must_use]
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.name().ends_with(suffix)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for PackageId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.raw
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

// ============================================================================
// Package Records
// ============================================================================

/// One row of the update list.
///
/// Produced when a check completes; `selected` is user-controlled and
/// starts out `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: PackageId,
    pub selected: bool,
}

impl PackageRecord {
    /// Creates a selected record.
    pub fn new(id: PackageId) -> Self {
        Self { id, selected: true }
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }

    pub fn version(&self) -> &str {
        self.id.version()
    }
}

impl From<PackageId> for PackageRecord {
    fn from(id: PackageId) -> Self {
        Self::new(id)
    }
}

/// Ids of all selected records, in list order.
pub fn selected_ids(records: &[PackageRecord]) -> Vec<PackageId> {
    records
        .iter()
        .filter(|r| r.selected)
        .map(|r| r.id.clone())
        .collect()
}
