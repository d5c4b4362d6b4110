//! BSON document shapes for the `backups` collection.

use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, Document, doc};
use serde::{Deserialize, Serialize};

use crate::domain::{NewSnapshotRecord, SnapshotId, SnapshotRecord, SnapshotStatus};

/// Field holding the capture instant, shared by sales and catalog entries.
pub const CREATED_AT_FIELD: &str = "created_at";

/// Field holding the lifecycle status of a catalog entry.
pub const STATUS_FIELD: &str = "status";

/// A catalog document as stored in MongoDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Document identity; absent before insertion.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Archive basename.
    pub filename: String,
    /// Absolute host path of the archive.
    pub path: String,
    /// Capture instant.
    pub created_at: bson::DateTime,
    /// Archive size in megabytes.
    pub size_mb: i64,
    /// `created`, `restored` or `failed`.
    pub status: SnapshotStatus,
}

impl From<&NewSnapshotRecord> for SnapshotDocument {
    fn from(record: &NewSnapshotRecord) -> Self {
        Self {
            id: None,
            filename: record.filename.clone(),
            path: record.path.to_string_lossy().into_owned(),
            created_at: bson::DateTime::from_millis(record.created_at.timestamp_millis()),
            size_mb: i64::try_from(record.size_mb).unwrap_or(i64::MAX),
            status: record.status,
        }
    }
}

/// Error converting a stored document back into a domain record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The document carries no `_id`.
    #[error("catalog document has no _id")]
    MissingId,
    /// The stored timestamp is outside the representable range.
    #[error("catalog document {0} has an out-of-range created_at")]
    InvalidTimestamp(String),
}

impl TryFrom<SnapshotDocument> for SnapshotRecord {
    type Error = DocumentError;

    fn try_from(document: SnapshotDocument) -> Result<Self, Self::Error> {
        let id = document.id.ok_or(DocumentError::MissingId)?.to_hex();
        let created_at = from_bson_datetime(document.created_at)
            .ok_or_else(|| DocumentError::InvalidTimestamp(id.clone()))?;
        Ok(Self {
            id: SnapshotId::new(id),
            filename: document.filename,
            path: PathBuf::from(document.path),
            created_at,
            size_mb: u64::try_from(document.size_mb).unwrap_or(0),
            status: document.status,
        })
    }
}

/// Converts a chrono instant into a BSON datetime (millisecond precision).
#[must_use]
pub fn to_bson_datetime(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

fn from_bson_datetime(at: bson::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(at.timestamp_millis()).single()
}

/// Filter selecting restorable entries.
#[must_use]
pub fn restorable_filter() -> Document {
    doc! { STATUS_FIELD: SnapshotStatus::Created.as_str() }
}

/// Sort order putting the latest restorable entry first.
#[must_use]
pub fn latest_first_sort() -> Document {
    doc! { CREATED_AT_FIELD: -1, "_id": -1 }
}

/// Filter matching entry `id` only while it may still move to `next`.
#[must_use]
pub fn status_update_filter(id: ObjectId, next: SnapshotStatus) -> Document {
    let sources: Vec<&str> = SnapshotStatus::sources_for(next)
        .into_iter()
        .map(SnapshotStatus::as_str)
        .collect();
    doc! { "_id": id, STATUS_FIELD: { "$in": sources } }
}

/// Filter matching sales recorded at or after `since`.
#[must_use]
pub fn sales_since_filter(since: DateTime<Utc>) -> Document {
    doc! { CREATED_AT_FIELD: { "$gte": to_bson_datetime(since) } }
}
