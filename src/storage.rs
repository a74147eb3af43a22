//! Temp hierarchy lifecycle
//!
//! Layout:
//!
//! ```text
//! <temp_root>/
//!   <archive_dir>/req-<id>/<archive>       originally fetched archives
//!   <payload_dir>/req-<id>/...             plain files and extracted trees
//! ```
//!
//! Each request owns its two `req-<id>` directories. An unsafe verdict destroys
//! both; a delivery removes the served file and prunes empty ancestors. All
//! removal here is best-effort: failures are logged and never returned, since
//! the verdict has already been decided by the time cleanup runs.

use crate::config::StorageConfig;
use crate::error::Result;
use crate::types::RequestId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Attempts at creating a workspace when a concurrent prune races us
const PREPARE_ATTEMPTS: u32 = 3;

/// Per-request storage directories
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestWorkspace {
    /// Request owning the directories
    pub id: RequestId,
    /// Where a fetched archive is stored
    pub archive_dir: PathBuf,
    /// Where a plain file is stored, or an archive is extracted to
    pub payload_dir: PathBuf,
}

impl RequestWorkspace {
    /// Storage directory for a fetched file of the given classification
    pub fn dir_for(&self, is_archive: bool) -> &Path {
        if is_archive {
            &self.archive_dir
        } else {
            &self.payload_dir
        }
    }

    /// Root that enumeration and submission always target
    pub fn scan_root(&self) -> &Path {
        &self.payload_dir
    }
}

/// Creates, destroys and prunes the temp hierarchy
#[derive(Clone, Debug)]
pub struct StorageManager {
    root: PathBuf,
    archive_root: PathBuf,
    payload_root: PathBuf,
    max_prune_depth: usize,
}

impl StorageManager {
    /// Create a manager for the configured layout (nothing is created on disk yet)
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.temp_root.clone(),
            archive_root: config.temp_root.join(&config.archive_dir),
            payload_root: config.temp_root.join(&config.payload_dir),
            max_prune_depth: config.max_prune_depth,
        }
    }

    /// Root of the hierarchy
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily create the hierarchy and this request's private directories
    pub async fn prepare(&self, id: RequestId) -> Result<RequestWorkspace> {
        let workspace = RequestWorkspace {
            id,
            archive_dir: self.archive_root.join(id.dir_name()),
            payload_dir: self.payload_root.join(id.dir_name()),
        };

        for dir in [&workspace.archive_dir, &workspace.payload_dir] {
            create_dir_resilient(dir).await?;
        }

        debug!(request_id = %id, ?workspace.payload_dir, "prepared request workspace");
        Ok(workspace)
    }

    /// Destroy everything a request stored (unsafe verdict or fatal error)
    ///
    /// Idempotent: already-absent directories are not an error.
    pub async fn nuke(&self, workspace: &RequestWorkspace) {
        for dir in [&workspace.archive_dir, &workspace.payload_dir] {
            match fs::remove_dir_all(dir).await {
                Ok(()) => debug!(request_id = %workspace.id, ?dir, "deleted request directory"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(request_id = %workspace.id, ?dir, error = %e, "failed to delete request directory")
                }
            }
        }
        self.remove_empty_roots().await;
        info!(request_id = %workspace.id, "request storage destroyed");
    }

    /// Settle a safe request down to the one file that will be served
    ///
    /// Removes the request directory that does not hold the artifact: the
    /// extracted tree for an archive, the unused archive directory otherwise.
    pub async fn keep_only(&self, workspace: &RequestWorkspace, is_archive: bool) {
        let unused = workspace.dir_for(!is_archive);
        match fs::remove_dir_all(unused).await {
            Ok(()) => debug!(request_id = %workspace.id, dir = ?unused, "discarded unused directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(request_id = %workspace.id, dir = ?unused, error = %e, "failed to discard unused directory")
            }
        }
    }

    /// Remove a delivered file, then its now-empty ancestors
    ///
    /// Walks upward from the file's parent, removing directories while they are
    /// empty, for at most `max_prune_depth` levels. Never climbs above the temp
    /// root. Finally the top-level directories are removed if they are empty.
    pub async fn release_served(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!(?path, "removed served file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(?path, error = %e, "failed to remove served file"),
        }

        let mut dir = path.parent().map(Path::to_path_buf);
        for _ in 0..self.max_prune_depth {
            let Some(current) = dir else { break };
            if !current.starts_with(&self.root) {
                break;
            }
            if fs::remove_dir(&current).await.is_err() {
                // not empty, or already gone
                break;
            }
            debug!(dir = ?current, "pruned empty directory");
            if current == self.root {
                break;
            }
            dir = current.parent().map(Path::to_path_buf);
        }

        self.remove_empty_roots().await;
    }

    async fn remove_empty_roots(&self) {
        for dir in [&self.archive_root, &self.payload_root, &self.root] {
            // remove_dir refuses non-empty directories, which is what we want
            let _ = fs::remove_dir(dir).await;
        }
    }
}

async fn create_dir_resilient(dir: &Path) -> Result<()> {
    let mut attempt = 1;
    loop {
        match fs::create_dir_all(dir).await {
            Ok(()) => return Ok(()),
            // a concurrent prune removed a parent between mkdir calls
            Err(e) if e.kind() == ErrorKind::NotFound && attempt < PREPARE_ATTEMPTS => {
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
