//! Catalog-assigned snapshot identifier.
//!
//! [`SnapshotId`] is an opaque string assigned by the catalog on insert.
//! The MongoDB catalog uses the hex form of the document `ObjectId`, which
//! sorts in creation order; ties on `created_at` are broken by comparing
//! identifiers, largest first.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a catalog entry, stable for the life of the record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Wraps a catalog-issued identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier as issued by the catalog.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SnapshotId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
