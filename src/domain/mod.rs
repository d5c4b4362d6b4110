//! Domain layer: snapshot identity, catalog entries, and archive naming.
//!
//! This module contains the data model shared by the catalog, the snapshot
//! engine and the control loop. It performs no I/O.

pub mod archive_name;
pub mod snapshot_id;
pub mod snapshot_record;

pub use archive_name::ArchiveName;
pub use snapshot_id::SnapshotId;
pub use snapshot_record::{NewSnapshotRecord, SnapshotRecord, SnapshotStatus};
