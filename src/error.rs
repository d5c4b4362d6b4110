//! Agent error taxonomy.
//!
//! [`AgentError`] is the central error type for the agent. Each variant
//! corresponds to one failure kind of the recovery loop and carries a stable
//! [`kind`](AgentError::kind) string that is attached to every log event.
//!
//! # Propagation
//!
//! | Kind                   | Handling                                  |
//! |------------------------|-------------------------------------------|
//! | `config`               | fatal at startup (exit 1)                 |
//! | `bootstrap_failed`     | fatal at startup (exit 1)                 |
//! | `probe_error`          | tick aborted, recovery delay, retry       |
//! | `dialog_unavailable`   | action skipped this tick                  |
//! | `capture_failed`       | logged, partial archive kept              |
//! | `catalog_unavailable`  | logged, artifact state is operator-visible |
//! | `no_snapshot_available`| logged, no action                         |
//! | `restore_aborted`      | logged, container state unchanged         |
//! | `restore_failed`       | surfaced, container stays stopped         |

use std::path::PathBuf;

/// Failure raised by any component of the agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The backup directory could not be created.
    #[error("cannot prepare backup directory {path}: {reason}")]
    BootstrapFailed {
        /// Directory that was being prepared.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// The sales activity check failed.
    #[error("activity probe failed: {0}")]
    ProbeError(String),

    /// The operator dialog could not be shown.
    #[error("operator dialog unavailable: {0}")]
    DialogUnavailable(String),

    /// The database dump or the archive write failed.
    #[error("snapshot capture failed: {0}")]
    CaptureFailed(String),

    /// A read or write against the snapshot catalog failed.
    #[error("snapshot catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// A restore was requested but the catalog has no restorable entry.
    #[error("no restorable snapshot in catalog")]
    NoSnapshotAvailable,

    /// The database container could not be stopped; nothing was restored.
    #[error("restore aborted: {0}")]
    RestoreAborted(String),

    /// The restore subprocess failed; the database container is left stopped.
    #[error("restore failed: {0}")]
    RestoreFailed(String),
}

impl AgentError {
    /// Returns the stable snake_case identifier of this failure kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::BootstrapFailed { .. } => "bootstrap_failed",
            Self::ProbeError(_) => "probe_error",
            Self::DialogUnavailable(_) => "dialog_unavailable",
            Self::CaptureFailed(_) => "capture_failed",
            Self::CatalogUnavailable(_) => "catalog_unavailable",
            Self::NoSnapshotAvailable => "no_snapshot_available",
            Self::RestoreAborted(_) => "restore_aborted",
            Self::RestoreFailed(_) => "restore_failed",
        }
    }

    /// Returns `true` if the loop should back off with the recovery delay
    /// instead of the regular check interval after this error.
    #[must_use]
    pub const fn needs_backoff(&self) -> bool {
        !matches!(
            self,
            Self::NoSnapshotAvailable | Self::DialogUnavailable(_)
        )
    }
}
