use crate::error::{Error, ExtractionError, Result};
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::shared::{failed, run_blocking, sanitize_entry_path};

/// Archive extractor for 7z files
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract a 7z archive into `dest_path`
    ///
    /// Entries are written by our own callback so each name is sanitized
    /// before it touches the filesystem; the canonicalize pass afterwards
    /// catches anything that still resolves outside the destination.
    pub fn try_extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting 7z extraction");

        std::fs::create_dir_all(dest_path)?;

        let mut extracted_files = Vec::new();
        sevenz_rust::decompress_file_with_extract_fn(
            archive_path,
            dest_path,
            |entry, reader, _unchecked_dest| {
                if let Some(file_path) =
                    Self::write_entry(archive_path, dest_path, entry, reader)?
                {
                    extracted_files.push(file_path);
                }
                Ok(true)
            },
        )
        .map_err(|e| failed(archive_path, format!("failed to extract 7z archive: {}", e)))?;

        Self::validate_extracted_paths(archive_path, dest_path)?;
        // two entries may sanitize to the same path
        extracted_files.sort();
        extracted_files.dedup();

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );
        Ok(extracted_files)
    }

    /// Write one entry under `dest_path`, returning the path of a written file
    ///
    /// Skipped entries are still drained: in a solid block the next entry's
    /// data follows directly in the same stream.
    fn write_entry(
        archive_path: &Path,
        dest_path: &Path,
        entry: &sevenz_rust::SevenZArchiveEntry,
        reader: &mut dyn Read,
    ) -> std::result::Result<Option<PathBuf>, sevenz_rust::Error> {
        let Some(sanitized) = sanitize_entry_path(Path::new(entry.name())) else {
            warn!(?archive_path, entry = entry.name(), "skipping entry with unsafe path");
            std::io::copy(reader, &mut std::io::sink()).map_err(sevenz_rust::Error::io)?;
            return Ok(None);
        };
        let file_path = dest_path.join(sanitized);

        if entry.is_directory() {
            std::fs::create_dir_all(&file_path).map_err(sevenz_rust::Error::io)?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).map_err(sevenz_rust::Error::io)?;
        }
        let mut writer = BufWriter::new(File::create(&file_path).map_err(sevenz_rust::Error::io)?);
        std::io::copy(reader, &mut writer).map_err(sevenz_rust::Error::io)?;
        Ok(Some(file_path))
    }

    /// Reject anything under `dest_path` that resolves outside of it
    pub(crate) fn validate_extracted_paths(archive_path: &Path, dest_path: &Path) -> Result<()> {
        let canonical_dest = dest_path.canonicalize()?;

        for entry in WalkDir::new(dest_path).min_depth(1) {
            let entry = entry.map_err(|e| failed(archive_path, e.to_string()))?;
            let canonical = entry.path().canonicalize()?;

            if !canonical.starts_with(&canonical_dest) {
                return Err(Error::Extraction(ExtractionError::UnsafePath {
                    archive: archive_path.to_path_buf(),
                    path: entry.path().to_path_buf(),
                }));
            }
        }
        Ok(())
    }

    /// Extract a 7z archive on the blocking pool
    pub async fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        run_blocking("7z", Self::try_extract, archive_path, dest_path).await
    }
}
