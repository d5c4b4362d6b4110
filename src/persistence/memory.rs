//! In-process catalog and probe.
//!
//! [`InMemoryCatalog`] keeps entries in a `Vec` behind a
//! [`tokio::sync::RwLock`] and applies the same selection rule as the
//! MongoDB catalog. [`StaticActivity`] answers the probe with a preset
//! result. Both are used by the test suites and for dry runs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ActivityProbe, SnapshotCatalog};
use crate::domain::snapshot_record::select_latest_created;
use crate::domain::{NewSnapshotRecord, SnapshotId, SnapshotRecord, SnapshotStatus};
use crate::error::AgentError;

/// Catalog held in memory.
///
/// Identities are zero-padded hex counters so they sort in insertion order,
/// like MongoDB `ObjectId`s.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: RwLock<Vec<SnapshotRecord>>,
    next_id: AtomicU64,
    offline: AtomicBool,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with
    /// [`AgentError::CatalogUnavailable`] while `offline` is `true`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns a copy of all entries in insertion order.
    pub async fn records(&self) -> Vec<SnapshotRecord> {
        self.records.read().await.clone()
    }

    /// Returns the entry with identity `id`, if present.
    pub async fn get(&self, id: &SnapshotId) -> Option<SnapshotRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| &r.id == id)
            .cloned()
    }

    fn check_online(&self) -> Result<(), AgentError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AgentError::CatalogUnavailable(
                "in-memory catalog is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotCatalog for InMemoryCatalog {
    async fn insert(&self, record: NewSnapshotRecord) -> Result<SnapshotId, AgentError> {
        self.check_online()?;
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = SnapshotId::new(format!("{seq:024x}"));
        self.records.write().await.push(record.with_id(id.clone()));
        Ok(id)
    }

    async fn latest_created(&self) -> Result<Option<SnapshotRecord>, AgentError> {
        self.check_online()?;
        let records = self.records.read().await;
        Ok(select_latest_created(records.iter()).cloned())
    }

    async fn set_status(&self, id: &SnapshotId, status: SnapshotStatus) -> Result<(), AgentError> {
        self.check_online()?;
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| &r.id == id) {
            Some(record) if record.status.can_advance_to(status) => record.status = status,
            Some(record) => tracing::warn!(
                snapshot_id = %id,
                from = %record.status,
                to = %status,
                "refusing to move catalog entry backwards"
            ),
            None => tracing::warn!(snapshot_id = %id, "status update matched no catalog entry"),
        }
        Ok(())
    }
}

/// Probe returning a preset answer and counting calls.
#[derive(Debug, Default)]
pub struct StaticActivity {
    active: AtomicBool,
    failing: AtomicBool,
    calls: AtomicU64,
}

impl StaticActivity {
    /// A probe that reports `active` on every call.
    #[must_use]
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
            ..Self::default()
        }
    }

    /// A probe whose every call fails with [`AgentError::ProbeError`].
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Changes the answer for subsequent calls.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Number of probe calls so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivityProbe for StaticActivity {
    async fn has_recent_activity(&self, _window: Duration) -> Result<bool, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AgentError::ProbeError("sales collection unreachable".to_string()));
        }
        Ok(self.active.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn draft(hour: u32) -> NewSnapshotRecord {
        let Some(at) = Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).single() else {
            panic!("valid timestamp");
        };
        let filename = format!("backup-20240115-{hour:02}0000.gz");
        NewSnapshotRecord::created(filename.clone(), PathBuf::from("/b").join(filename), at, 3)
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let catalog = InMemoryCatalog::new();
        let Ok(a) = catalog.insert(draft(10)).await else {
            panic!("insert failed");
        };
        let Ok(b) = catalog.insert(draft(11)).await else {
            panic!("insert failed");
        };
        assert!(b > a);
        assert_eq!(catalog.records().await.len(), 2);
    }

    #[tokio::test]
    async fn latest_created_ignores_restored() {
        let catalog = InMemoryCatalog::new();
        let Ok(older) = catalog.insert(draft(10)).await else {
            panic!("insert failed");
        };
        let Ok(newer) = catalog.insert(draft(11)).await else {
            panic!("insert failed");
        };
        tokio_test::assert_ok!(catalog.set_status(&newer, SnapshotStatus::Restored).await);

        let Ok(Some(latest)) = catalog.latest_created().await else {
            panic!("expected a restorable entry");
        };
        assert_eq!(latest.id, older);
    }

    #[tokio::test]
    async fn restored_entry_is_never_reset_to_created() {
        let catalog = InMemoryCatalog::new();
        let Ok(id) = catalog.insert(draft(10)).await else {
            panic!("insert failed");
        };
        tokio_test::assert_ok!(catalog.set_status(&id, SnapshotStatus::Restored).await);
        tokio_test::assert_ok!(catalog.set_status(&id, SnapshotStatus::Created).await);

        let Some(record) = catalog.get(&id).await else {
            panic!("entry vanished");
        };
        assert_eq!(record.status, SnapshotStatus::Restored);
        let Ok(latest) = catalog.latest_created().await else {
            panic!("read failed");
        };
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn empty_catalog_has_no_latest() {
        let catalog = InMemoryCatalog::new();
        let Ok(latest) = catalog.latest_created().await else {
            panic!("read failed");
        };
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn offline_catalog_is_unavailable() {
        let catalog = InMemoryCatalog::new();
        catalog.set_offline(true);
        let result = catalog.insert(draft(10)).await;
        assert!(matches!(result, Err(AgentError::CatalogUnavailable(_))));
        assert!(catalog.records().await.is_empty());
    }

    #[tokio::test]
    async fn static_probe_counts_calls() {
        let probe = StaticActivity::new(true);
        assert!(matches!(
            probe.has_recent_activity(Duration::from_secs(300)).await,
            Ok(true)
        ));
        probe.set_active(false);
        assert!(matches!(
            probe.has_recent_activity(Duration::from_secs(300)).await,
            Ok(false)
        ));
        assert_eq!(probe.calls(), 2);

        let failing = StaticActivity::failing();
        assert!(matches!(
            failing.has_recent_activity(Duration::from_secs(300)).await,
            Err(AgentError::ProbeError(_))
        ));
    }
}
