//! File editing helpers shared by the configuration steps
//!
//! Every write is skipped when the file already has the desired content, and
//! every overwrite of an existing file first leaves a backup copy beside it.

use crate::HardenError;
use crate::state::unix_timestamp;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// What a write did to the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// File already had the desired content
    Unchanged,
    /// File was written; `backup` holds the previous content if there was any
    Written { backup: Option<PathBuf> },
}

impl FileChange {
    pub fn changed(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    pub fn backup(&self) -> Option<&Path> {
        match self {
            Self::Written { backup } => backup.as_deref(),
            Self::Unchanged => None,
        }
    }
}

/// Pick a fresh backup path: `<file>.<pid>.<timestamp>~`
pub fn backup_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = format!("{}.{}.{}", name, std::process::id(), unix_timestamp());

    let mut candidate = path.with_file_name(format!("{}~", base));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}.{}~", base, n));
        n += 1;
    }
    candidate
}

/// Copy the current file to a backup path and return that path
pub async fn backup_file(path: &Path) -> Result<PathBuf, HardenError> {
    let backup = backup_path(path);
    fs::copy(path, &backup).await?;
    info!("Backed up {} to {}", path.display(), backup.display());
    Ok(backup)
}

/// Write `content` to `path` unless it is already there
///
/// With `backup` set, an existing file with different content is copied
/// aside first.
pub async fn write_if_changed(
    path: &Path,
    content: &str,
    backup: bool,
) -> Result<FileChange, HardenError> {
    let existing = match fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    if existing.as_deref() == Some(content.as_bytes()) {
        debug!("{} already up to date", path.display());
        return Ok(FileChange::Unchanged);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let backup = if backup && existing.is_some() {
        Some(backup_file(path).await?)
    } else {
        None
    };

    fs::write(path, content).await?;
    info!("Wrote {}", path.display());
    Ok(FileChange::Written { backup })
}

/// Replace every line matching `pattern` with `replacement`
///
/// The pattern is applied in multi-line mode, so `^` and `$` anchor to line
/// boundaries. When nothing matches, or the replacement yields identical
/// content, the file is left alone.
pub async fn replace_lines(
    path: &Path,
    pattern: &Regex,
    replacement: &str,
    backup: bool,
) -> Result<FileChange, HardenError> {
    let content = fs::read_to_string(path).await?;
    let updated = pattern.replace_all(&content, replacement);

    if updated == content {
        debug!(
            "No line in {} matches {}, leaving it alone",
            path.display(),
            pattern.as_str()
        );
        return Ok(FileChange::Unchanged);
    }

    let backup = if backup {
        Some(backup_file(path).await?)
    } else {
        None
    };

    fs::write(path, updated.as_bytes()).await?;
    info!("Updated {}", path.display());
    Ok(FileChange::Written { backup })
}

/// Set octal permission bits, returning whether they changed
pub async fn ensure_mode(path: &Path, mode: u32) -> Result<bool, HardenError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let current = fs::metadata(path).await?.permissions().mode() & 0o7777;
        if current == mode {
            return Ok(false);
        }

        debug!("Setting permissions {:o} on {:?}", mode, path);
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
        Ok(true)
    }

    #[cfg(not(unix))]
    {
        let _ = (path, mode);
        Ok(false)
    }
}

/// Numeric uid and gid of a file
pub async fn ownership(path: &Path) -> Result<(u32, u32), HardenError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        let meta = fs::metadata(path).await?;
        Ok((meta.uid(), meta.gid()))
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok((0, 0))
    }
}
