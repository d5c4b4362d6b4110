//! The periodic control loop.
//!
//! Each tick runs strictly in order: activity probe, then (only when the
//! sales collection is quiet) the operator dialog, then at most one recovery
//! action, then a sleep. Operator polarity:
//!
//! | Answer        | Meaning                     | Action    |
//! |---------------|-----------------------------|-----------|
//! | Yes           | the point of sale has a problem | restore |
//! | No            | quiet but healthy           | capture   |
//! | Unavailable   | nobody could be asked       | none      |
//!
//! Recoverable errors never end the loop. A failed tick sleeps the shorter
//! recovery delay instead of the check interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::RecoveryEngine;
use crate::config::AgentConfig;
use crate::dialog::{DialogAnswer, OperatorGate, Question};
use crate::domain::SnapshotRecord;
use crate::error::AgentError;
use crate::persistence::ActivityProbe;

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Sales were recorded in the window; nothing was asked.
    Active,
    /// The operator reported no problem and a snapshot was captured.
    Captured(PathBuf),
    /// The operator reported a problem and a snapshot was restored.
    Restored(SnapshotRecord),
    /// The operator reported a problem but the catalog had nothing to restore.
    NothingToRestore,
    /// The operator could not be asked.
    DialogUnavailable(String),
    /// Shutdown was requested before a recovery action started.
    Interrupted,
    /// The probe or the chosen action failed.
    Failed(AgentError),
}

impl TickOutcome {
    /// Delay before the next tick: the recovery delay after a failure,
    /// the check interval otherwise.
    #[must_use]
    pub fn next_delay(&self, config: &AgentConfig) -> Duration {
        match self {
            Self::Failed(e) if e.needs_backoff() => config.recovery_delay,
            _ => config.check_interval,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Captured(_) => "captured",
            Self::Restored(_) => "restored",
            Self::NothingToRestore => "nothing_to_restore",
            Self::DialogUnavailable(_) => "dialog_unavailable",
            Self::Interrupted => "interrupted",
            Self::Failed(_) => "failed",
        }
    }
}

/// Periodic driver sequencing probe, operator gate and recovery action.
#[derive(Debug, Clone)]
pub struct RecoveryLoop {
    config: Arc<AgentConfig>,
    probe: Arc<dyn ActivityProbe>,
    gate: Arc<dyn OperatorGate>,
    engine: Arc<dyn RecoveryEngine>,
}

impl RecoveryLoop {
    /// Creates a loop over the given collaborators.
    #[must_use]
    pub fn new(
        config: Arc<AgentConfig>,
        probe: Arc<dyn ActivityProbe>,
        gate: Arc<dyn OperatorGate>,
        engine: Arc<dyn RecoveryEngine>,
    ) -> Self {
        Self {
            config,
            probe,
            gate,
            engine,
        }
    }

    /// Runs one tick without sleeping.
    pub async fn tick(&self) -> TickOutcome {
        self.tick_until(None).await
    }

    /// Runs ticks until `shutdown` turns `true`.
    ///
    /// The flag is honored between steps and during the sleep; an action
    /// that has started always runs to completion.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            check_interval = ?self.config.check_interval,
            recovery_delay = ?self.config.recovery_delay,
            "recovery loop started"
        );

        while !*shutdown.borrow() {
            let outcome = self.tick_until(Some(&shutdown)).await;
            let delay = outcome.next_delay(&self.config);
            tracing::debug!(outcome = outcome.label(), ?delay, "tick finished");
            if sleep_or_stop(delay, &mut shutdown).await {
                break;
            }
        }

        tracing::info!("recovery loop stopped");
    }

    async fn tick_until(&self, shutdown: Option<&watch::Receiver<bool>>) -> TickOutcome {
        let outcome = self.tick_steps(shutdown).await;
        log_outcome(&outcome);
        outcome
    }

    async fn tick_steps(&self, shutdown: Option<&watch::Receiver<bool>>) -> TickOutcome {
        match self
            .probe
            .has_recent_activity(self.config.check_interval)
            .await
        {
            Err(e) => return TickOutcome::Failed(e),
            Ok(true) => return TickOutcome::Active,
            Ok(false) => {}
        }

        if stop_requested(shutdown) {
            return TickOutcome::Interrupted;
        }

        tracing::info!(
            window = ?self.config.check_interval,
            "no sales in window; asking operator"
        );
        let question = Question::quiet_period(self.config.check_interval);
        let answer = self.gate.ask(&question).await;

        // The operator may have taken hours to answer.
        if stop_requested(shutdown) {
            tracing::info!(?answer, "shutdown requested while the operator was deciding");
            return TickOutcome::Interrupted;
        }

        match answer {
            DialogAnswer::Unavailable(reason) => TickOutcome::DialogUnavailable(reason),
            DialogAnswer::Yes => {
                tracing::info!("operator reported a problem; restoring latest snapshot");
                match self.engine.restore().await {
                    Ok(record) => TickOutcome::Restored(record),
                    Err(AgentError::NoSnapshotAvailable) => TickOutcome::NothingToRestore,
                    Err(e) => TickOutcome::Failed(e),
                }
            }
            DialogAnswer::No => {
                tracing::info!("operator reported no problem; capturing snapshot");
                match self.engine.capture().await {
                    Ok(path) => TickOutcome::Captured(path),
                    Err(e) => TickOutcome::Failed(e),
                }
            }
        }
    }
}

fn log_outcome(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::Active => {
            tracing::info!("sales recorded in window; no action");
        }
        TickOutcome::Captured(path) => {
            tracing::info!(path = %path.display(), "preventive snapshot stored");
        }
        TickOutcome::Restored(record) => {
            tracing::info!(
                snapshot_id = %record.id,
                filename = %record.filename,
                "database rolled back to snapshot"
            );
        }
        TickOutcome::NothingToRestore => {
            let e = AgentError::NoSnapshotAvailable;
            tracing::warn!(kind = e.kind(), "{e}; nothing restored");
        }
        TickOutcome::DialogUnavailable(reason) => {
            let e = AgentError::DialogUnavailable(reason.clone());
            tracing::warn!(kind = e.kind(), error = %e, "skipping tick");
        }
        TickOutcome::Interrupted => {
            tracing::info!("shutdown requested; no recovery action taken");
        }
        TickOutcome::Failed(e) => {
            tracing::error!(kind = e.kind(), error = %e, "tick failed");
        }
    }
}

fn stop_requested(shutdown: Option<&watch::Receiver<bool>>) -> bool {
    shutdown.is_some_and(|rx| *rx.borrow())
}

/// Sleeps for `delay` unless shutdown is requested first. Returns `true` on
/// shutdown.
async fn sleep_or_stop(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        tokio::select! {
            () = tokio::time::sleep_until(deadline) => return false,
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return true,
                Ok(()) => {}
                Err(_) => {
                    // Sender gone: nobody can ask us to stop any more.
                    tokio::time::sleep_until(deadline).await;
                    return false;
                }
            },
        }
    }
}
