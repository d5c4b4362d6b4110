//! Persistence layer: snapshot catalog and sales activity probe.
//!
//! Both live in the observed MongoDB database. The [`SnapshotCatalog`] and
//! [`ActivityProbe`] traits are the seams the snapshot engine and control
//! loop depend on; [`mongo`] provides the production implementations and
//! [`memory`] in-process ones.

pub mod memory;
pub mod models;
pub mod mongo;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{NewSnapshotRecord, SnapshotId, SnapshotRecord, SnapshotStatus};
use crate::error::AgentError;

pub use memory::{InMemoryCatalog, StaticActivity};
pub use mongo::{MongoActivityProbe, MongoCatalog};

/// Durable append-only record of snapshots.
#[async_trait]
pub trait SnapshotCatalog: Send + Sync + fmt::Debug {
    /// Stores a new entry and returns its catalog-assigned identity.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::CatalogUnavailable`] if the write fails.
    async fn insert(&self, record: NewSnapshotRecord) -> Result<SnapshotId, AgentError>;

    /// Returns the entry with the greatest `created_at` among those in
    /// status `created`, ties broken by the largest identity.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::CatalogUnavailable`] if the read fails.
    async fn latest_created(&self) -> Result<Option<SnapshotRecord>, AgentError>;

    /// Overwrites the status of entry `id`.
    ///
    /// The lifecycle is honored by callers, not checked here.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::CatalogUnavailable`] if the write fails.
    async fn set_status(&self, id: &SnapshotId, status: SnapshotStatus) -> Result<(), AgentError>;
}

/// Answers whether any sale was recorded recently.
#[async_trait]
pub trait ActivityProbe: Send + Sync + fmt::Debug {
    /// Returns `true` if at least one sale has `created_at >= now - window`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ProbeError`] if the database cannot be queried.
    async fn has_recent_activity(&self, window: Duration) -> Result<bool, AgentError>;
}
