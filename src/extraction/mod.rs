//! Archive extraction
//!
//! Unpacks ZIP, RAR, 7z, tar and tar.gz archives into a request's scan root,
//! recursing into nested archives. Every failure is fatal to the request: an
//! archive that cannot be fully unpacked is never scanned as an opaque blob.

mod rar;
mod sevenz;
mod shared;
mod tar;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use rar::RarExtractor;
pub use sevenz::SevenZipExtractor;
pub use shared::{detect_archive_type, detect_from_extension, extract_recursive, is_archive};
pub use tar::TarExtractor;
pub use zip::ZipExtractor;

use crate::config::ExtractionConfig;
use crate::error::{Error, ExtractionError, Result};
use crate::types::{ArchiveType, ExtractedTree};
use std::path::{Path, PathBuf};
use tracing::info;

/// Unified archive extraction dispatcher
///
/// Routes to the extractor for `archive_type`; no recursion.
///
/// # Returns
/// * `Ok(Vec<PathBuf>)` - List of extracted files on success
/// * `Err(Error)` - Corrupt, encrypted or unreadable archive
pub async fn extract_archive(
    archive_path: &Path,
    archive_type: ArchiveType,
    dest_path: &Path,
) -> Result<Vec<PathBuf>> {
    match archive_type {
        ArchiveType::Zip => ZipExtractor::extract(archive_path, dest_path).await,
        ArchiveType::Rar => RarExtractor::extract(archive_path, dest_path).await,
        ArchiveType::SevenZip => SevenZipExtractor::extract(archive_path, dest_path).await,
        ArchiveType::Tar => TarExtractor::extract(archive_path, dest_path).await,
        ArchiveType::TarGz => TarExtractor::extract_gz(archive_path, dest_path).await,
    }
}

/// Unpack a fetched archive into `dest_root`, including nested archives
///
/// The format comes from the declared MIME, falling back to the file name.
///
/// # Example
/// ```no_run
/// use download_gate::config::ExtractionConfig;
/// use download_gate::extraction::extract;
/// use std::path::Path;
///
/// # async fn example() -> download_gate::error::Result<()> {
/// let tree = extract(
///     Path::new("temp/compressed/req-1/bundle.zip"),
///     Path::new("temp/uncompressed/req-1"),
///     "application/zip",
///     &ExtractionConfig::default(),
/// )
/// .await?;
/// println!("{} files", tree.files.len());
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    archive_path: &Path,
    dest_root: &Path,
    declared_mime: &str,
    config: &ExtractionConfig,
) -> Result<ExtractedTree> {
    let archive_type = detect_archive_type(declared_mime, archive_path).ok_or_else(|| {
        Error::Extraction(ExtractionError::UnknownFormat {
            archive: archive_path.to_path_buf(),
        })
    })?;

    info!(?archive_path, ?archive_type, declared_mime, "dispatching extraction");

    let files = extract_recursive(archive_path, archive_type, dest_root, config, 0).await?;

    Ok(ExtractedTree {
        root: dest_root.to_path_buf(),
        files,
    })
}
