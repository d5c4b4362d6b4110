//! Snapshot engine: database dump capture and container-coordinated restore.
//!
//! Capture runs `mongodump` inside the database container and writes the
//! gzip archive stream to `<backup_dir>/backup-YYYYMMDD-HHmmss.gz`, then
//! registers it in the catalog. Restore stops the database container,
//! replays the latest restorable archive from a one-shot container that
//! mounts the data volume and the backup directory, and starts the
//! database container again.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::clock::Clock;
use crate::config::AgentConfig;
use crate::domain::archive_name::parse_stamp;
use crate::domain::{ArchiveName, NewSnapshotRecord, SnapshotRecord, SnapshotStatus};
use crate::error::AgentError;
use crate::persistence::SnapshotCatalog;
use crate::process::{CommandSpec, OutputMode, ProcessRunner};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// The two recovery actions the control loop can trigger.
#[async_trait]
pub trait RecoveryEngine: Send + Sync + fmt::Debug {
    /// Captures a new snapshot and returns the archive path.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::CaptureFailed`] if the dump or the write fails,
    /// and [`AgentError::CatalogUnavailable`] if the archive was written but
    /// could not be registered.
    async fn capture(&self) -> Result<PathBuf, AgentError>;

    /// Restores the latest restorable snapshot and returns its record.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NoSnapshotAvailable`] on an empty catalog,
    /// [`AgentError::RestoreAborted`] if the container cannot be stopped,
    /// [`AgentError::RestoreFailed`] if the restore or the restart fails, and
    /// [`AgentError::CatalogUnavailable`] if the catalog cannot be read or
    /// the final status cannot be written.
    async fn restore(&self) -> Result<SnapshotRecord, AgentError>;
}

/// [`RecoveryEngine`] driving `docker`, `mongodump` and `mongorestore`.
#[derive(Debug, Clone)]
pub struct SnapshotEngine {
    config: Arc<AgentConfig>,
    catalog: Arc<dyn SnapshotCatalog>,
    runner: Arc<dyn ProcessRunner>,
    clock: Arc<dyn Clock>,
}

impl SnapshotEngine {
    /// Creates an engine over the given catalog, runner and clock.
    #[must_use]
    pub fn new(
        config: Arc<AgentConfig>,
        catalog: Arc<dyn SnapshotCatalog>,
        runner: Arc<dyn ProcessRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            catalog,
            runner,
            clock,
        }
    }

    fn docker(&self) -> CommandSpec {
        CommandSpec::new(self.config.docker_bin.as_str()).timeout(self.config.command_timeout)
    }

    /// `docker exec <container> mongodump --uri=<uri> --archive --gzip`
    fn dump_command(&self) -> CommandSpec {
        self.docker().args([
            "exec".to_string(),
            self.config.container_name.clone(),
            "mongodump".to_string(),
            format!("--uri={}", self.config.mongo_uri),
            "--archive".to_string(),
            "--gzip".to_string(),
        ])
    }

    fn container_command(&self, verb: &str) -> CommandSpec {
        self.docker()
            .arg(verb)
            .arg(self.config.container_name.as_str())
    }

    /// One-shot `mongorestore` container with the data volume and the backup
    /// directory mounted.
    fn restore_command(&self, filename: &str) -> CommandSpec {
        let config = &self.config;
        self.docker().args([
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:{}", config.data_volume_name, config.container_data_path),
            "-v".to_string(),
            format!(
                "{}:{}",
                config.backup_dir.display(),
                config.container_backup_path
            ),
            config.mongo_image.clone(),
            "mongorestore".to_string(),
            format!("--uri={}", config.mongo_uri),
            "--gzip".to_string(),
            format!("--archive={}/{filename}", config.container_backup_path),
        ])
    }
}

#[async_trait]
impl RecoveryEngine for SnapshotEngine {
    async fn capture(&self) -> Result<PathBuf, AgentError> {
        let now = self.clock.now();
        let archive = ArchiveName::for_instant(&self.config.backup_dir, &now);
        tracing::info!(path = %archive.path.display(), "capturing snapshot");

        let output = self
            .runner
            .run(&self.dump_command(), OutputMode::Capture)
            .await
            .map_err(|e| {
                tracing::error!(exit_code = ?e.exit_code(), "mongodump failed");
                AgentError::CaptureFailed(e.to_string())
            })?;
        if output.stdout.is_empty() {
            return Err(AgentError::CaptureFailed(
                "mongodump produced an empty archive".to_string(),
            ));
        }

        write_archive(&archive, &output.stdout)
            .await
            .map_err(|e| {
                AgentError::CaptureFailed(format!(
                    "cannot write {}: {e}",
                    archive.partial_path().display()
                ))
            })?;

        let size_mb = size_in_mb(&archive.path).await;
        let draft = NewSnapshotRecord::created(
            archive.filename.clone(),
            archive.path.clone(),
            now.with_timezone(&Utc),
            size_mb,
        );
        let id = self.catalog.insert(draft).await.inspect_err(|e| {
            tracing::error!(
                path = %archive.path.display(),
                kind = e.kind(),
                "archive written but not cataloged"
            );
        })?;

        tracing::info!(
            snapshot_id = %id,
            filename = %archive.filename,
            size_mb,
            "snapshot captured"
        );
        Ok(archive.path)
    }

    async fn restore(&self) -> Result<SnapshotRecord, AgentError> {
        let target = self
            .catalog
            .latest_created()
            .await?
            .ok_or(AgentError::NoSnapshotAvailable)?;
        let captured_local = parse_stamp(&target.filename)
            .map_or_else(|| "unknown".to_string(), |stamp| stamp.to_string());
        tracing::info!(
            snapshot_id = %target.id,
            filename = %target.filename,
            created_at = %target.created_at,
            %captured_local,
            "restoring snapshot"
        );

        let container = &self.config.container_name;
        self.runner
            .run(&self.container_command("stop"), OutputMode::Inherit)
            .await
            .map_err(|e| AgentError::RestoreAborted(format!("cannot stop {container}: {e}")))?;
        tracing::info!(%container, "database container stopped");

        tokio::time::sleep(self.config.quiescence_delay).await;

        if let Err(e) = self
            .runner
            .run(&self.restore_command(&target.filename), OutputMode::Inherit)
            .await
        {
            tracing::error!(
                snapshot_id = %target.id,
                %container,
                exit_code = ?e.exit_code(),
                "restore failed; database container left stopped"
            );
            return Err(AgentError::RestoreFailed(e.to_string()));
        }
        tracing::info!(snapshot_id = %target.id, "archive restored");

        // The catalog lives in this database, so it is only writable again
        // once the container is back up.
        self.runner
            .run(&self.container_command("start"), OutputMode::Inherit)
            .await
            .map_err(|e| {
                AgentError::RestoreFailed(format!(
                    "archive restored but {container} did not start: {e}"
                ))
            })?;
        tracing::info!(%container, "database container started");

        self.catalog
            .set_status(&target.id, SnapshotStatus::Restored)
            .await?;

        Ok(SnapshotRecord {
            status: SnapshotStatus::Restored,
            ..target
        })
    }
}

/// Writes `bytes` to a `.partial` sibling, syncs it, and renames it into
/// place. A failed write leaves the partial file behind.
async fn write_archive(archive: &ArchiveName, bytes: &[u8]) -> std::io::Result<()> {
    let partial = archive.partial_path();
    let mut file = tokio::fs::File::create(&partial).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&partial, &archive.path).await
}

/// Whole megabytes on disk, rounded down; zero if unmeasurable.
async fn size_in_mb(path: &Path) -> u64 {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len() / BYTES_PER_MB,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot measure archive size");
            0
        }
    }
}
