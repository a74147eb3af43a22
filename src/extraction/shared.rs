use crate::config::ExtractionConfig;
use crate::error::{Error, ExtractionError, Result};
use crate::types::ArchiveType;
use std::path::{Component, Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Shorthand for a format-level extraction failure
pub(crate) fn failed(archive: &Path, reason: impl Into<String>) -> Error {
    Error::Extraction(ExtractionError::Failed {
        archive: archive.to_path_buf(),
        reason: reason.into(),
    })
}

/// Reduce an entry path to its normal components
///
/// `../../etc/passwd` becomes `etc/passwd`, `/abs/x` becomes `abs/x`.
/// Returns None when nothing is left (e.g. a bare `..` entry).
pub(crate) fn sanitize_entry_path(raw: &Path) -> Option<PathBuf> {
    let sanitized = raw
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect::<PathBuf>();

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Run a synchronous extractor on the blocking pool
///
/// Every format's `try_extract` goes through here so the runtime never
/// stalls on archive I/O.
pub(crate) async fn run_blocking(
    format_name: &str,
    try_extract_fn: impl FnOnce(&Path, &Path) -> Result<Vec<PathBuf>> + Send + 'static,
    archive_path: &Path,
    dest_path: &Path,
) -> Result<Vec<PathBuf>> {
    debug!(?archive_path, ?dest_path, "starting {} extraction", format_name);

    let archive_owned = archive_path.to_path_buf();
    let dest_owned = dest_path.to_path_buf();

    let result = spawn_blocking(move || try_extract_fn(&archive_owned, &dest_owned))
        .await
        .map_err(|e| failed(archive_path, format!("extraction task panicked: {}", e)))?;

    if let Err(e) = &result {
        warn!(?archive_path, error = %e, "{} extraction failed", format_name);
    }
    result
}

/// Pick an extractor for a fetched archive
///
/// The declared MIME is consulted first: `7z`, then `rar`, then `tar`
/// (gzip-wrapped if the MIME mentions `gz` or the name ends in
/// `.tar.gz`/`.tgz`), then `gzip` (only for a tarball name), then `zip`.
/// `gzip` has to be tested before `zip` since it contains it. If the MIME
/// says nothing usable the file name decides.
pub fn detect_archive_type(declared_mime: &str, path: &Path) -> Option<ArchiveType> {
    let mime = declared_mime.to_ascii_lowercase();

    let from_mime = if mime.contains("7z") {
        Some(ArchiveType::SevenZip)
    } else if mime.contains("rar") {
        Some(ArchiveType::Rar)
    } else if mime.contains("tar") {
        if mime.contains("gz") || is_tarball_name(path) {
            Some(ArchiveType::TarGz)
        } else {
            Some(ArchiveType::Tar)
        }
    } else if mime.contains("gzip") {
        is_tarball_name(path).then_some(ArchiveType::TarGz)
    } else if mime.contains("zip") {
        Some(ArchiveType::Zip)
    } else {
        None
    };

    from_mime.or_else(|| detect_from_extension(path))
}

/// Archive type from the file name alone
pub fn detect_from_extension(path: &Path) -> Option<ArchiveType> {
    if is_tarball_name(path) {
        return Some(ArchiveType::TarGz);
    }
    let ext = path.extension()?.to_str()?.to_lowercase();

    match ext.as_str() {
        "rar" | "r00" => Some(ArchiveType::Rar),
        "7z" => Some(ArchiveType::SevenZip),
        "zip" => Some(ArchiveType::Zip),
        "tar" => Some(ArchiveType::Tar),
        _ => None,
    }
}

fn is_tarball_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| {
            let n = n.to_ascii_lowercase();
            n.ends_with(".tar.gz") || n.ends_with(".tgz")
        })
        .unwrap_or(false)
}

/// Check if an extracted file should be unpacked as a nested archive
///
/// # Arguments
/// * `path` - Path to the file to check
/// * `archive_extensions` - List of extensions to treat as archives (without dots)
pub fn is_archive(path: &Path, archive_extensions: &[String]) -> bool {
    if let Some(ext) = path.extension() {
        let ext_str = ext.to_string_lossy().to_lowercase();
        archive_extensions
            .iter()
            .any(|ae| ae.to_lowercase() == ext_str)
    } else {
        false
    }
}

/// Extract an archive, then any archives found inside it
///
/// Nested archives are unpacked into `nested_<stem>_<depth>` next to the
/// nested archive, up to `config.max_recursion_depth` levels below the
/// top-level archive. The nested archive file itself stays in place.
///
/// A nested archive whose format cannot be identified is left as a plain
/// file. One that is identified but fails to extract fails the whole call:
/// its contents could not be inspected.
///
/// # Returns
/// * `Ok(Vec<PathBuf>)` - Every file extracted, at all depths
/// * `Err(Error)` - The first extraction failure
pub fn extract_recursive<'a>(
    archive_path: &'a Path,
    archive_type: ArchiveType,
    dest_path: &'a Path,
    config: &'a ExtractionConfig,
    current_depth: u32,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
    Box::pin(async move {
        debug!(
            ?archive_path,
            ?archive_type,
            current_depth,
            max_depth = config.max_recursion_depth,
            "extracting archive"
        );

        let extracted = super::extract_archive(archive_path, archive_type, dest_path).await?;

        if current_depth >= config.max_recursion_depth {
            debug!(
                current_depth,
                "reached maximum recursion depth, not extracting nested archives"
            );
            return Ok(extracted);
        }

        let mut all_files = extracted.clone();

        for file in &extracted {
            if !is_archive(file, &config.archive_extensions) {
                continue;
            }
            let Some(nested_type) = detect_from_extension(file) else {
                warn!(?file, "nested file looks like an archive but its format is unknown, leaving as is");
                continue;
            };

            let nested_dest = file.parent().unwrap_or(dest_path).join(format!(
                "nested_{}_{}",
                file.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("archive"),
                current_depth + 1
            ));

            info!(?file, ?nested_dest, "found nested archive, extracting recursively");
            let nested_files =
                extract_recursive(file, nested_type, &nested_dest, config, current_depth + 1)
                    .await?;
            all_files.extend(nested_files);
        }

        info!(
            ?archive_path,
            total_files = all_files.len(),
            depth = current_depth,
            "completed extraction"
        );

        Ok(all_files)
    })
}
