//! Process-global log sink.
//!
//! Three destinations, installed once at startup:
//!
//! - console: human-readable, colorized, all enabled levels;
//! - `<log_dir>/combined.log`: JSON lines, all enabled levels;
//! - `<log_dir>/error.log`: JSON lines, `ERROR` only.
//!
//! The enabled levels come from `RUST_LOG` (default `info`).

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::error::AgentError;

/// File receiving every event.
pub const COMBINED_LOG: &str = "combined.log";

/// File receiving only errors.
pub const ERROR_LOG: &str = "error.log";

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`AgentError::Config`] if the log directory or files cannot be
/// opened, or if a global subscriber is already installed.
pub fn init(log_dir: &Path) -> Result<(), AgentError> {
    let combined = open_log(log_dir, COMBINED_LOG)?;
    let errors = open_log(log_dir, ERROR_LOG)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = fmt::layer().with_ansi(true).with_target(false);
    let combined = fmt::layer()
        .json()
        .with_ansi(false)
        .with_current_span(false)
        .with_writer(Mutex::new(combined));
    let errors = fmt::layer()
        .json()
        .with_ansi(false)
        .with_current_span(false)
        .with_writer(Mutex::new(errors))
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(combined)
        .with(errors)
        .try_init()
        .map_err(|e| AgentError::Config(format!("cannot install log subscriber: {e}")))
}

fn open_log(dir: &Path, name: &str) -> Result<File, AgentError> {
    std::fs::create_dir_all(dir)
        .and_then(|()| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
        })
        .map_err(|e| AgentError::Config(format!("cannot open {}: {e}", dir.join(name).display())))
}
