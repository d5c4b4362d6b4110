//! Startup preparation of the backup directory.

use std::fs::DirBuilder;
use std::path::Path;

use crate::error::AgentError;

/// Permission bits for a newly created backup directory.
pub const BACKUP_DIR_MODE: u32 = 0o755;

/// Ensures `dir` exists, creating it and any missing parents with mode
/// [`BACKUP_DIR_MODE`].
///
/// An existing directory is left untouched, permissions included, so
/// repeated startups are harmless.
///
/// # Errors
///
/// Returns [`AgentError::BootstrapFailed`] if `dir` exists but is not a
/// directory, or if it cannot be created.
pub fn ensure_backup_dir(dir: &Path) -> Result<(), AgentError> {
    let failed = |reason: String| AgentError::BootstrapFailed {
        path: dir.to_path_buf(),
        reason,
    };

    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {
            tracing::debug!(path = %dir.display(), "backup directory present");
            return Ok(());
        }
        Ok(_) => return Err(failed("path exists and is not a directory".to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(failed(e.to_string())),
    }

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(BACKUP_DIR_MODE);
    }
    builder.create(dir).map_err(|e| failed(e.to_string()))?;

    tracing::info!(
        path = %dir.display(),
        mode = %format_args!("{BACKUP_DIR_MODE:o}"),
        "backup directory created"
    );
    Ok(())
}
