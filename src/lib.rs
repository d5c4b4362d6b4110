//! # pos-recovery-agent
//!
//! Operator-assisted disaster-recovery agent for a point-of-sale MongoDB
//! database.
//!
//! The agent watches the sales collection. When no sale has been recorded
//! during the last check interval it asks the on-site operator whether the
//! point of sale is having problems. On "yes" it rolls the database back to
//! the latest known-good snapshot; on "no" it takes a fresh preventive
//! snapshot. Snapshots are cataloged in the same database.
//!
//! ## Architecture
//!
//! ```text
//! RecoveryLoop (service/)
//!     │
//!     ├── ActivityProbe ──────────── MongoDB sales collection (persistence/)
//!     ├── OperatorGate (dialog) ──── zenity ── ProcessRunner (process/)
//!     │
//!     └── SnapshotEngine (service/)
//!             ├── SnapshotCatalog ── MongoDB backups collection (persistence/)
//!             └── ProcessRunner ──── docker exec mongodump
//!                                    docker stop / run mongorestore / start
//! ```

pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod dialog;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod process;
pub mod service;
pub mod telemetry;
