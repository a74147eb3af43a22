use crate::error::Result;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::shared::{failed, run_blocking, sanitize_entry_path};

/// Archive extractor for tar and tar.gz files
pub struct TarExtractor;

impl TarExtractor {
    /// Extract a plain tar archive into `dest_path`
    pub fn try_extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting tar extraction");
        let reader = BufReader::new(File::open(archive_path)?);
        Self::extract_entries(tar::Archive::new(reader), archive_path, dest_path)
    }

    /// Extract a gzip-compressed tar archive into `dest_path`
    pub fn try_extract_gz(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting tar.gz extraction");
        let reader = BufReader::new(File::open(archive_path)?);
        Self::extract_entries(tar::Archive::new(GzDecoder::new(reader)), archive_path, dest_path)
    }

    /// Write out regular files and directories; links and devices are skipped
    fn extract_entries<R: Read>(
        mut archive: tar::Archive<R>,
        archive_path: &Path,
        dest_path: &Path,
    ) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dest_path)?;

        let entries = archive
            .entries()
            .map_err(|e| failed(archive_path, format!("failed to read tar entries: {}", e)))?;

        let mut extracted_files = Vec::new();

        for entry_result in entries {
            let mut entry = entry_result
                .map_err(|e| failed(archive_path, format!("failed to read tar entry: {}", e)))?;

            let raw_path = entry
                .path()
                .map_err(|e| failed(archive_path, format!("invalid entry path: {}", e)))?
                .into_owned();

            let Some(sanitized) = sanitize_entry_path(&raw_path) else {
                warn!(?archive_path, entry = ?raw_path, "skipping entry with unsafe path");
                continue;
            };
            let file_path = dest_path.join(&sanitized);

            let entry_type = entry.header().entry_type();
            match entry_type {
                tar::EntryType::Directory => {
                    std::fs::create_dir_all(&file_path)?;
                }
                tar::EntryType::Regular | tar::EntryType::Continuous => {
                    if let Some(parent) = file_path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let mut outfile = File::create(&file_path)?;
                    std::io::copy(&mut entry, &mut outfile).map_err(|e| {
                        failed(archive_path, format!("failed to extract {:?}: {}", raw_path, e))
                    })?;
                    extracted_files.push(file_path);
                }
                other => {
                    debug!(?archive_path, entry = ?raw_path, entry_type = ?other, "skipping non-regular entry");
                }
            }
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "tar extraction successful"
        );

        Ok(extracted_files)
    }

    /// Extract a tar archive on the blocking pool
    pub async fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        run_blocking("tar", Self::try_extract, archive_path, dest_path).await
    }

    /// Extract a tar.gz archive on the blocking pool
    pub async fn extract_gz(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        run_blocking("tar.gz", Self::try_extract_gz, archive_path, dest_path).await
    }
}
