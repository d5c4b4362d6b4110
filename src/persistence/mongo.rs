//! MongoDB implementation of the catalog and activity probe.
//!
//! Every operation opens its own client and shuts it down before returning,
//! on success and on failure alike. Ticks are minutes apart, so there is no
//! pool to keep healthy between them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};

use super::models::{
    STATUS_FIELD, SnapshotDocument, latest_first_sort, restorable_filter, sales_since_filter,
    status_update_filter,
};
use super::{ActivityProbe, SnapshotCatalog};
use crate::clock::Clock;
use crate::config::AgentConfig;
use crate::domain::{NewSnapshotRecord, SnapshotId, SnapshotRecord, SnapshotStatus};
use crate::error::AgentError;

/// Database used when the connection string names none.
const FALLBACK_DATABASE: &str = "tocgame";

/// Upper bound on finding a reachable server for one operation.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens a client for `uri`.
async fn connect(uri: &str) -> Result<Client, mongodb::error::Error> {
    let mut options = ClientOptions::parse(uri).await?;
    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
    options.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
    Client::with_options(options)
}

/// Returns the collection `name` in the connection string's database.
fn collection<T: Send + Sync>(client: &Client, name: &str) -> Collection<T> {
    client
        .default_database()
        .unwrap_or_else(|| client.database(FALLBACK_DATABASE))
        .collection(name)
}

fn unavailable(e: impl std::fmt::Display) -> AgentError {
    AgentError::CatalogUnavailable(e.to_string())
}

/// Snapshot catalog stored in the `backups` collection.
#[derive(Debug, Clone)]
pub struct MongoCatalog {
    uri: String,
    collection: String,
}

impl MongoCatalog {
    /// Creates a catalog over the collection named in `config`.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            uri: config.mongo_uri.clone(),
            collection: config.backups_collection_name.clone(),
        }
    }

    async fn open(&self) -> Result<(Client, Collection<SnapshotDocument>), AgentError> {
        let client = connect(&self.uri).await.map_err(unavailable)?;
        let backups = collection(&client, &self.collection);
        Ok((client, backups))
    }
}

#[async_trait]
impl SnapshotCatalog for MongoCatalog {
    async fn insert(&self, record: NewSnapshotRecord) -> Result<SnapshotId, AgentError> {
        let (client, backups) = self.open().await?;
        let result = backups.insert_one(SnapshotDocument::from(&record)).await;
        client.shutdown().await;

        let inserted = result.map_err(unavailable)?;
        let id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| unavailable("catalog returned a non-ObjectId identity"))?;
        tracing::debug!(snapshot_id = %id, filename = %record.filename, "catalog entry inserted");
        Ok(SnapshotId::new(id.to_hex()))
    }

    async fn latest_created(&self) -> Result<Option<SnapshotRecord>, AgentError> {
        let (client, backups) = self.open().await?;
        let result = backups
            .find_one(restorable_filter())
            .sort(latest_first_sort())
            .await;
        client.shutdown().await;

        result
            .map_err(unavailable)?
            .map(SnapshotRecord::try_from)
            .transpose()
            .map_err(unavailable)
    }

    async fn set_status(&self, id: &SnapshotId, status: SnapshotStatus) -> Result<(), AgentError> {
        let oid = ObjectId::parse_str(id.as_str()).map_err(unavailable)?;
        let (client, backups) = self.open().await?;
        let result = backups
            .update_one(
                status_update_filter(oid, status),
                doc! { "$set": { STATUS_FIELD: status.as_str() } },
            )
            .await;
        client.shutdown().await;

        let updated = result.map_err(unavailable)?;
        if updated.matched_count == 0 {
            tracing::warn!(
                snapshot_id = %id,
                %status,
                "status update matched no catalog entry that may move to it"
            );
        }
        Ok(())
    }
}

/// Activity probe counting documents in the sales collection.
#[derive(Debug, Clone)]
pub struct MongoActivityProbe {
    uri: String,
    collection: String,
    clock: Arc<dyn Clock>,
}

impl MongoActivityProbe {
    /// Creates a probe over the sales collection named in `config`.
    #[must_use]
    pub fn new(config: &AgentConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            uri: config.mongo_uri.clone(),
            collection: config.sales_collection_name.clone(),
            clock,
        }
    }
}

#[async_trait]
impl ActivityProbe for MongoActivityProbe {
    async fn has_recent_activity(&self, window: Duration) -> Result<bool, AgentError> {
        let probe_err = |e: &dyn std::fmt::Display| AgentError::ProbeError(e.to_string());

        let window = TimeDelta::from_std(window).map_err(|e| probe_err(&e))?;
        let now = self.clock.now().with_timezone(&Utc);
        let since = now
            .checked_sub_signed(window)
            .ok_or_else(|| probe_err(&"activity window reaches before the epoch range"))?;

        let client = connect(&self.uri).await.map_err(|e| probe_err(&e))?;
        let sales: Collection<Document> = collection(&client, &self.collection);
        let result = sales.count_documents(sales_since_filter(since)).await;
        client.shutdown().await;

        let count = result.map_err(|e| probe_err(&e))?;
        tracing::debug!(count, since = %since, "sales in window");
        Ok(count > 0)
    }
}
