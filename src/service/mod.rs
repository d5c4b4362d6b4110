//! Service layer: recovery actions and the loop that triggers them.

pub mod recovery_loop;
pub mod snapshot_engine;

pub use recovery_loop::{RecoveryLoop, TickOutcome};
pub use snapshot_engine::{RecoveryEngine, SnapshotEngine};
