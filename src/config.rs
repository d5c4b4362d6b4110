//! Agent configuration loaded from environment variables.
//!
//! All settings come from environment variables (or a `.env` file via
//! `dotenvy`). The configuration is built once at startup and passed by
//! value into every component; nothing reads the environment afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default MongoDB connection string.
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/tocgame";

/// Default tick period and probe window, in milliseconds.
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 300_000;

/// Process-wide agent configuration, immutable after startup.
///
/// Loaded via [`AgentConfig::from_env`]; [`AgentConfig::default`] yields the
/// documented defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Connection string of the observed database.
    pub mongo_uri: String,

    /// Name of the running database container.
    pub container_name: String,

    /// Docker volume holding the database files.
    pub data_volume_name: String,

    /// Host directory where archives are written.
    pub backup_dir: PathBuf,

    /// Tick period; also the width of the activity window.
    pub check_interval: Duration,

    /// Collection holding sales documents.
    pub sales_collection_name: String,

    /// Collection holding the snapshot catalog.
    pub backups_collection_name: String,

    /// Image used for the one-shot restore container.
    pub mongo_image: String,

    /// Container runtime executable.
    pub docker_bin: String,

    /// Question-dialog executable.
    pub dialog_bin: String,

    /// Width in pixels of the operator dialog.
    pub dialog_width: u32,

    /// Optional limit on dump, restore and container subprocesses.
    pub command_timeout: Option<Duration>,

    /// Pause between stopping the container and starting the restore.
    pub quiescence_delay: Duration,

    /// Pause after a failed tick, used instead of the check interval.
    pub recovery_delay: Duration,

    /// Database data path inside the restore container.
    pub container_data_path: String,

    /// Mount point of `backup_dir` inside the restore container.
    pub container_backup_path: String,

    /// Directory holding `combined.log` and `error.log`.
    pub log_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mongo_uri: DEFAULT_MONGO_URI.to_string(),
            container_name: "mongodb".to_string(),
            data_volume_name: "mongo_data".to_string(),
            backup_dir: default_backup_dir(None),
            check_interval: Duration::from_millis(DEFAULT_CHECK_INTERVAL_MS),
            sales_collection_name: "sales".to_string(),
            backups_collection_name: "backups".to_string(),
            mongo_image: "mongo".to_string(),
            docker_bin: "docker".to_string(),
            dialog_bin: "zenity".to_string(),
            dialog_width: 400,
            command_timeout: None,
            quiescence_delay: Duration::from_secs(3),
            recovery_delay: Duration::from_secs(10),
            container_data_path: "/data/db".to_string(),
            container_backup_path: "/backups".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AgentConfig {
    /// Loads configuration from the process environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` first so a `.env` file may supply
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if `CHECK_INTERVAL` or
    /// `COMMAND_TIMEOUT_SECS` is set but is not a valid number.
    pub fn from_env() -> Result<Self, AgentError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Unset keys keep their default.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if `CHECK_INTERVAL` is zero or not a
    /// number, or if `COMMAND_TIMEOUT_SECS` is not a number.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AgentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let check_interval_ms: u64 = parse_strict(&lookup, "CHECK_INTERVAL")?
            .unwrap_or(DEFAULT_CHECK_INTERVAL_MS);
        if check_interval_ms == 0 {
            return Err(AgentError::Config(
                "CHECK_INTERVAL must be greater than zero".to_string(),
            ));
        }

        let command_timeout = match parse_strict::<u64, _>(&lookup, "COMMAND_TIMEOUT_SECS")? {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        };

        let backup_dir = lookup("BACKUP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_backup_dir(lookup("HOME")));

        Ok(Self {
            mongo_uri: lookup("MONGO_URI").unwrap_or(defaults.mongo_uri),
            container_name: lookup("CONTAINER_NAME").unwrap_or(defaults.container_name),
            data_volume_name: lookup("DOCKER_VOLUME").unwrap_or(defaults.data_volume_name),
            backup_dir,
            check_interval: Duration::from_millis(check_interval_ms),
            sales_collection_name: lookup("SALES_COLLECTION_NAME")
                .unwrap_or(defaults.sales_collection_name),
            backups_collection_name: lookup("BACKUPS_COLLECTION_NAME")
                .unwrap_or(defaults.backups_collection_name),
            mongo_image: lookup("MONGO_IMAGE").unwrap_or(defaults.mongo_image),
            docker_bin: lookup("DOCKER_BIN").unwrap_or(defaults.docker_bin),
            dialog_bin: lookup("DIALOG_BIN").unwrap_or(defaults.dialog_bin),
            dialog_width: parse_lenient(&lookup, "DIALOG_WIDTH", defaults.dialog_width),
            command_timeout,
            log_dir: lookup("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            ..defaults
        })
    }
}

/// `<home>/backups/tocgamedb`, or a relative path when no home is known.
fn default_backup_dir(home: Option<String>) -> PathBuf {
    home.map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("backups")
        .join("tocgamedb")
}

/// Parses `key` as `T`, failing if it is set but malformed.
fn parse_strict<T, F>(lookup: &F, key: &str) -> Result<Option<T>, AgentError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AgentError::Config(format!("{key} is not a valid number: {raw:?}"))),
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_lenient<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
