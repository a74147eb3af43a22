//! Scan-root enumeration

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// List every regular file under `root`, depth-first
///
/// Entries are visited sorted by file name, so the order is the same on every
/// run. Directories and symlinks are left out. An empty or missing root yields
/// an empty list; what that means for the verdict is the aggregator's call.
pub fn enumerate(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to walk {}: {}",
                root.display(),
                e
            )))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    debug!(?root, file_count = files.len(), "enumerated scan root");
    Ok(files)
}
