//! pos-recovery-agent entry point.
//!
//! Loads configuration, installs logging, prepares the backup directory and
//! runs the recovery loop until SIGINT or SIGTERM.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use pos_recovery_agent::bootstrap;
use pos_recovery_agent::clock::{Clock, SystemClock};
use pos_recovery_agent::config::AgentConfig;
use pos_recovery_agent::dialog::ZenityGate;
use pos_recovery_agent::persistence::{MongoActivityProbe, MongoCatalog, SnapshotCatalog};
use pos_recovery_agent::process::{ProcessRunner, SystemRunner};
use pos_recovery_agent::service::{RecoveryLoop, SnapshotEngine};
use pos_recovery_agent::telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AgentConfig::from_env().context("loading configuration")?;

    // Initialize logging
    telemetry::init(&config.log_dir).context("initializing logging")?;
    tracing::info!(
        mongo_uri = %config.mongo_uri,
        container = %config.container_name,
        volume = %config.data_volume_name,
        backup_dir = %config.backup_dir.display(),
        check_interval = ?config.check_interval,
        "starting pos-recovery-agent"
    );

    if let Err(e) = bootstrap::ensure_backup_dir(&config.backup_dir) {
        tracing::error!(kind = e.kind(), error = %e, "startup failed");
        return Err(e).context("preparing backup directory");
    }

    // Build collaborators
    let config = Arc::new(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
    let catalog: Arc<dyn SnapshotCatalog> = Arc::new(MongoCatalog::new(&config));

    report_latest_snapshot(catalog.as_ref()).await;

    let probe = Arc::new(MongoActivityProbe::new(&config, Arc::clone(&clock)));
    let gate = Arc::new(ZenityGate::new(&config, Arc::clone(&runner)));
    let engine = Arc::new(SnapshotEngine::new(
        Arc::clone(&config),
        catalog,
        runner,
        clock,
    ));
    let recovery = RecoveryLoop::new(config, probe, gate, engine);

    // Run until told to stop
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(forward_termination(stop_tx));
    recovery.run(stop_rx).await;

    Ok(())
}

/// Logs the snapshot a restore would currently pick.
async fn report_latest_snapshot(catalog: &dyn SnapshotCatalog) {
    match catalog.latest_created().await {
        Ok(Some(record)) => tracing::info!(
            snapshot_id = %record.id,
            filename = %record.filename,
            created_at = %record.created_at,
            size_mb = record.size_mb,
            "latest restorable snapshot"
        ),
        Ok(None) => tracing::warn!("catalog holds no restorable snapshot yet"),
        Err(e) => tracing::warn!(kind = e.kind(), error = %e, "cannot read catalog at startup"),
    }
}

/// Flips the stop flag on SIGINT or SIGTERM.
async fn forward_termination(stop: watch::Sender<bool>) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        () = terminate => {}
    }

    tracing::info!("termination requested; stopping at the next safe point");
    let _ = stop.send(true);
}
