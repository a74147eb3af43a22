use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::shared::{failed, run_blocking, sanitize_entry_path};

/// Archive extractor for RAR files
pub struct RarExtractor;

impl RarExtractor {
    fn convert_unrar_error(e: unrar::error::UnrarError, archive_path: &Path) -> Error {
        failed(archive_path, e.to_string())
    }

    /// Extract every entry of a RAR archive into `dest_path`
    ///
    /// Entry names are reduced to their normal components, so `../` prefixes
    /// and absolute paths stay inside the destination. Encrypted archives fail.
    pub fn try_extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting RAR extraction");

        std::fs::create_dir_all(dest_path)?;

        let processor = unrar::Archive::new(archive_path)
            .open_for_processing()
            .map_err(|e| Self::convert_unrar_error(e, archive_path))?;

        let mut extracted_files = Vec::new();

        let mut at_header = processor;
        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => return Err(Self::convert_unrar_error(e, archive_path)),
            };

            let header = at_file.entry();

            let Some(sanitized) = sanitize_entry_path(Path::new(&header.filename)) else {
                warn!(?archive_path, entry = ?header.filename, "skipping entry with unsafe path");
                at_header = at_file
                    .skip()
                    .map_err(|e| failed(archive_path, format!("failed to skip unsafe entry: {}", e)))?;
                continue;
            };

            if header.is_directory() {
                at_header = at_file
                    .skip()
                    .map_err(|e| failed(archive_path, format!("failed to skip directory: {}", e)))?;
                continue;
            }

            let file_path = dest_path.join(&sanitized);
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            at_header = at_file
                .extract_to(&file_path)
                .map_err(|e| Self::convert_unrar_error(e, archive_path))?;
            extracted_files.push(file_path);
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "RAR extraction successful"
        );

        Ok(extracted_files)
    }

    /// Extract a RAR archive on the blocking pool
    pub async fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        run_blocking("RAR", Self::try_extract, archive_path, dest_path).await
    }
}
