//! Snapshot catalog entries and their lifecycle.
//!
//! ```text
//! (capture OK)           (operator-approved restore OK)
//!   ───────────→ created ──────────────────────────────→ restored
//!                   │
//!                   └──(operator marks bad, out-of-band)──→ failed
//! ```
//!
//! A record never returns to `created` once it leaves that state.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SnapshotId;

/// Lifecycle status of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    /// Archive captured and available for restore.
    Created,
    /// Archive was restored into the database.
    Restored,
    /// Archive was marked unusable by an operator.
    Failed,
}

impl SnapshotStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Created, Self::Restored, Self::Failed];

    /// Returns the status as stored in the catalog.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Restored => "restored",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` if moving from `self` to `next` respects the lifecycle.
    ///
    /// Rewriting the current status is allowed; `restored` and `failed` are
    /// terminal.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, _) | (Self::Restored, Self::Restored) | (Self::Failed, Self::Failed)
        )
    }

    /// Statuses from which an entry may move to `next`.
    #[must_use]
    pub fn sources_for(next: Self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_advance_to(next))
            .collect()
    }

    /// Returns `true` if an entry in this status may be picked for restore.
    #[must_use]
    pub const fn is_restorable(self) -> bool {
        matches!(self, Self::Created)
    }
}

impl fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry before the catalog has assigned its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshotRecord {
    /// Archive basename.
    pub filename: String,
    /// Absolute host path of the archive.
    pub path: PathBuf,
    /// Instant of capture; never updated after insertion.
    pub created_at: DateTime<Utc>,
    /// Archive size in whole megabytes at registration time.
    pub size_mb: u64,
    /// Initial status, `created` for every capture.
    pub status: SnapshotStatus,
}

impl NewSnapshotRecord {
    /// Draft for a freshly captured archive.
    #[must_use]
    pub fn created(
        filename: String,
        path: PathBuf,
        created_at: DateTime<Utc>,
        size_mb: u64,
    ) -> Self {
        Self {
            filename,
            path,
            created_at,
            size_mb,
            status: SnapshotStatus::Created,
        }
    }

    /// Attaches the catalog-assigned identity.
    #[must_use]
    pub fn with_id(self, id: SnapshotId) -> SnapshotRecord {
        SnapshotRecord {
            id,
            filename: self.filename,
            path: self.path,
            created_at: self.created_at,
            size_mb: self.size_mb,
            status: self.status,
        }
    }
}

/// A stored catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Catalog-assigned identity.
    pub id: SnapshotId,
    /// Archive basename.
    pub filename: String,
    /// Absolute host path of the archive.
    pub path: PathBuf,
    /// Instant of capture.
    pub created_at: DateTime<Utc>,
    /// Archive size in whole megabytes at registration time.
    pub size_mb: u64,
    /// Current lifecycle status.
    pub status: SnapshotStatus,
}

/// Picks the latest restorable entry: greatest `created_at` among `created`
/// entries, ties broken by the largest identity.
#[must_use]
pub fn select_latest_created<'a, I>(records: I) -> Option<&'a SnapshotRecord>
where
    I: IntoIterator<Item = &'a SnapshotRecord>,
{
    records
        .into_iter()
        .filter(|r| r.status.is_restorable())
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
}
