//! Archive file naming.
//!
//! Snapshots live at `<backup_dir>/backup-YYYYMMDD-HHmmss.gz`, stamped in the
//! agent's local time at the moment of capture.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone};

const PREFIX: &str = "backup-";
const EXTENSION: &str = ".gz";
const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Name and location of one archive on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    /// Basename, e.g. `backup-20240115-120000.gz`.
    pub filename: String,
    /// Full host path inside the backup directory.
    pub path: PathBuf,
}

impl ArchiveName {
    /// Builds the archive name for a capture taken at `at`, formatted in
    /// the offset carried by `at`.
    #[must_use]
    pub fn for_instant<Tz>(backup_dir: &Path, at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let filename = format!("{PREFIX}{}{EXTENSION}", at.format(STAMP_FORMAT));
        let path = backup_dir.join(&filename);
        Self { filename, path }
    }

    /// Sibling path the dump is written to before it is renamed into place.
    #[must_use]
    pub fn partial_path(&self) -> PathBuf {
        let mut partial = self.path.clone().into_os_string();
        partial.push(".partial");
        PathBuf::from(partial)
    }
}

/// Recovers the local capture time encoded in an archive basename.
///
/// Returns `None` for names that do not follow the archive pattern.
#[must_use]
pub fn parse_stamp(filename: &str) -> Option<NaiveDateTime> {
    let stamp = filename.strip_prefix(PREFIX)?.strip_suffix(EXTENSION)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()
}
