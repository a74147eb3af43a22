use crate::config::ExtractionConfig;
use crate::error::{Error, ExtractionError};
use crate::extraction::*;
use crate::types::ArchiveType;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing the given files
fn create_zip_archive(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

/// Create a ZipCrypto-encrypted ZIP (the only encryption zip 0.6 can write)
fn create_encrypted_zip(archive_path: &Path, file_name: &str, content: &[u8]) {
    use ::zip::unstable::write::FileOptionsExt;
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Stored)
        .with_deprecated_encryption(b"secret");
    writer.start_file(file_name, options).unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap();
}

/// Build tar bytes, writing entry names verbatim (so `../` survives)
fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = ::tar::Builder::new(Vec::new());
    for (name, content) in files {
        let mut header = ::tar::Header::new_gnu();
        let raw = name.as_bytes();
        header.as_gnu_mut().unwrap().name[..raw.len()].copy_from_slice(raw);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(::tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, *content).unwrap();
    }
    builder.into_inner().unwrap()
}

fn create_tar_gz(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(&tar_bytes(files)).unwrap();
    encoder.finish().unwrap();
}

fn relative_names(root: &Path, files: &[std::path::PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = files
        .iter()
        .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[test]
fn test_detect_archive_type_from_mime() {
    let p = Path::new("download.bin");
    assert_eq!(detect_archive_type("application/zip", p), Some(ArchiveType::Zip));
    assert_eq!(
        detect_archive_type("application/x-zip-compressed", p),
        Some(ArchiveType::Zip)
    );
    assert_eq!(detect_archive_type("application/vnd.rar", p), Some(ArchiveType::Rar));
    assert_eq!(
        detect_archive_type("application/x-7z-compressed", p),
        Some(ArchiveType::SevenZip)
    );
    assert_eq!(detect_archive_type("application/x-tar", p), Some(ArchiveType::Tar));
    assert_eq!(detect_archive_type("application/x-gtar-gz", p), Some(ArchiveType::TarGz));
}

#[test]
fn test_detect_archive_type_gzip_is_not_zip() {
    assert_eq!(
        detect_archive_type("application/gzip", Path::new("src.tar.gz")),
        Some(ArchiveType::TarGz)
    );
    assert_eq!(
        detect_archive_type("application/x-tar", Path::new("src.tgz")),
        Some(ArchiveType::TarGz)
    );
    // a bare .gz is a single compressed file, not something we unpack
    assert_eq!(detect_archive_type("application/gzip", Path::new("dump.gz")), None);
}

#[test]
fn test_detect_archive_type_falls_back_to_extension() {
    assert_eq!(
        detect_archive_type("application/octet-stream", Path::new("a.ZIP")),
        Some(ArchiveType::Zip)
    );
    assert_eq!(detect_archive_type("", Path::new("a.r00")), Some(ArchiveType::Rar));
    assert_eq!(detect_archive_type("", Path::new("a.7z")), Some(ArchiveType::SevenZip));
    assert_eq!(detect_archive_type("", Path::new("a.txt")), None);
    assert_eq!(detect_archive_type("", Path::new("noext")), None);
}

#[test]
fn test_is_archive_uses_configured_extensions() {
    let config = ExtractionConfig::default();
    assert!(is_archive(Path::new("inner.zip"), &config.archive_extensions));
    assert!(is_archive(Path::new("INNER.RAR"), &config.archive_extensions));
    assert!(is_archive(Path::new("x.tar.gz"), &config.archive_extensions));
    assert!(!is_archive(Path::new("readme.txt"), &config.archive_extensions));
    assert!(!is_archive(Path::new("Makefile"), &config.archive_extensions));

    let custom = vec!["cbz".to_string()];
    assert!(is_archive(Path::new("comic.cbz"), &custom));
    assert!(!is_archive(Path::new("inner.zip"), &custom));
}

// ---------------------------------------------------------------------------
// ZIP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_zip_extracts_files_and_directories() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("bundle.zip");
    create_zip_archive(
        &archive,
        &[("a.txt", b"alpha"), ("docs/b.txt", b"beta"), ("docs/deep/c.txt", b"gamma")],
    );
    let dest = temp_dir.path().join("out");

    let files = ZipExtractor::extract(&archive, &dest).await.unwrap();

    assert_eq!(
        relative_names(&dest, &files),
        vec!["a.txt", "docs/b.txt", "docs/deep/c.txt"]
    );
    assert_eq!(std::fs::read(dest.join("docs/deep/c.txt")).unwrap(), b"gamma");
}

#[tokio::test]
async fn test_zip_skips_traversal_entries() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("evil.zip");
    create_zip_archive(&archive, &[("../escape.txt", b"evil"), ("ok.txt", b"fine")]);
    let dest = temp_dir.path().join("out");

    let files = ZipExtractor::extract(&archive, &dest).await.unwrap();

    assert_eq!(relative_names(&dest, &files), vec!["ok.txt"]);
    assert!(!temp_dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_zip_encrypted_entry_fails() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("locked.zip");
    create_encrypted_zip(&archive, "secret.txt", b"hidden");

    let result = ZipExtractor::extract(&archive, &temp_dir.path().join("out")).await;

    assert!(
        matches!(result, Err(Error::Extraction(ExtractionError::Failed { .. }))),
        "encrypted ZIP must not extract without a password: {result:?}"
    );
}

#[tokio::test]
async fn test_zip_corrupt_archive_fails() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("broken.zip");
    std::fs::write(&archive, b"this is not a zip file").unwrap();

    let result = ZipExtractor::extract(&archive, &temp_dir.path().join("out")).await;
    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::Failed { .. }))
    ));
}

// ---------------------------------------------------------------------------
// tar / tar.gz
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_tar_extracts_regular_files() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("plain.tar");
    std::fs::write(&archive, tar_bytes(&[("x/one.txt", b"1"), ("two.txt", b"22")])).unwrap();
    let dest = temp_dir.path().join("out");

    let files = TarExtractor::extract(&archive, &dest).await.unwrap();

    assert_eq!(relative_names(&dest, &files), vec!["two.txt", "x/one.txt"]);
    assert_eq!(std::fs::read(dest.join("two.txt")).unwrap(), b"22");
}

#[tokio::test]
async fn test_tar_gz_strips_parent_components() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("src.tar.gz");
    create_tar_gz(&archive, &[("../../evil.txt", b"evil"), ("/abs/path.txt", b"abs")]);
    let dest = temp_dir.path().join("out");

    let files = TarExtractor::extract_gz(&archive, &dest).await.unwrap();

    assert_eq!(relative_names(&dest, &files), vec!["abs/path.txt", "evil.txt"]);
    assert!(!temp_dir.path().join("evil.txt").exists());
}

#[tokio::test]
async fn test_tar_skips_symlinks() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("links.tar");

    let mut builder = ::tar::Builder::new(Vec::new());
    let mut header = ::tar::Header::new_gnu();
    header.set_path("link").unwrap();
    header.set_size(0);
    header.set_entry_type(::tar::EntryType::Symlink);
    header.set_link_name("/etc/passwd").unwrap();
    header.set_cksum();
    builder.append(&header, &[][..]).unwrap();
    std::fs::write(&archive, builder.into_inner().unwrap()).unwrap();

    let dest = temp_dir.path().join("out");
    let files = TarExtractor::extract(&archive, &dest).await.unwrap();

    assert!(files.is_empty());
    assert!(!dest.join("link").exists());
}

#[tokio::test]
async fn test_gz_without_tar_inside_fails() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("fake.tgz");
    std::fs::write(&archive, b"\x1f\x8b not really gzip").unwrap();

    let result = TarExtractor::extract_gz(&archive, &temp_dir.path().join("out")).await;
    assert!(result.is_err());
}

// ---------------------------------------------------------------------------
// 7z
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_7z_round_trip_through_extractor() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("src");
    std::fs::create_dir_all(source.join("sub")).unwrap();
    std::fs::write(source.join("top.txt"), b"top").unwrap();
    std::fs::write(source.join("sub/inner.txt"), b"inner").unwrap();
    let archive = temp_dir.path().join("pack.7z");
    sevenz_rust::compress_to_path(&source, &archive).unwrap();
    let dest = temp_dir.path().join("out");

    let files = SevenZipExtractor::extract(&archive, &dest).await.unwrap();

    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.ends_with("inner.txt")));
    assert!(files.iter().all(|f| f.starts_with(&dest)));
}

#[tokio::test]
async fn test_7z_parent_dir_entry_stays_inside_destination() {
    let temp_dir = TempDir::new().unwrap();
    let payload = temp_dir.path().join("payload.txt");
    std::fs::write(&payload, b"escape attempt").unwrap();
    let archive = temp_dir.path().join("evil.7z");
    let mut writer = sevenz_rust::SevenZWriter::create(&archive).unwrap();
    writer
        .push_archive_entry(
            sevenz_rust::SevenZArchiveEntry::from_path(&payload, "../escaped.txt".to_string()),
            Some(std::fs::File::open(&payload).unwrap()),
        )
        .unwrap();
    writer.finish().unwrap();
    let scan_root = temp_dir.path().join("uncompressed");
    let dest = scan_root.join("req-1");

    let files = SevenZipExtractor::extract(&archive, &dest).await.unwrap();

    assert_eq!(files, vec![dest.join("escaped.txt")]);
    assert_eq!(std::fs::read(&files[0]).unwrap(), b"escape attempt");
    assert!(!scan_root.join("escaped.txt").exists());
}

#[test]
fn test_7z_validation_rejects_symlink_escape() {
    let temp_dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let outside_file = outside.path().join("secret.txt");
    std::fs::write(&outside_file, b"secret").unwrap();

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&outside_file, temp_dir.path().join("escape_link")).unwrap();

        let result =
            SevenZipExtractor::validate_extracted_paths(Path::new("x.7z"), temp_dir.path());
        match result {
            Err(Error::Extraction(ExtractionError::UnsafePath { path, .. })) => {
                assert!(path.ends_with("escape_link"));
            }
            other => panic!("expected UnsafePath, got: {other:?}"),
        }
    }
}

#[test]
fn test_7z_validation_accepts_normal_tree() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("a/b")).unwrap();
    std::fs::write(temp_dir.path().join("a/b/file.txt"), b"data").unwrap();

    SevenZipExtractor::validate_extracted_paths(Path::new("x.7z"), temp_dir.path()).unwrap();
}

// ---------------------------------------------------------------------------
// RAR (no writer available, so only failure paths)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rar_invalid_archive_fails() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("bogus.rar");
    std::fs::write(&archive, b"definitely not a rar archive").unwrap();

    let result = RarExtractor::extract(&archive, &temp_dir.path().join("out")).await;
    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::Failed { .. }))
    ));
}

// ---------------------------------------------------------------------------
// Dispatcher and recursion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_extract_unknown_format_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("mystery.bin");
    std::fs::write(&archive, b"???").unwrap();

    let result = extract(
        &archive,
        &temp_dir.path().join("out"),
        "application/octet-stream",
        &ExtractionConfig::default(),
    )
    .await;

    match result {
        Err(Error::Extraction(ExtractionError::UnknownFormat { archive: a })) => {
            assert_eq!(a, archive)
        }
        other => panic!("expected UnknownFormat, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_extract_recurses_into_nested_archives() {
    let temp_dir = TempDir::new().unwrap();
    let inner = temp_dir.path().join("inner.zip");
    create_zip_archive(&inner, &[("payload.txt", b"deep")]);
    let inner_bytes = std::fs::read(&inner).unwrap();

    let outer = temp_dir.path().join("outer.zip");
    create_zip_archive(&outer, &[("readme.txt", b"hi"), ("pkg/inner.zip", &inner_bytes)]);
    let dest = temp_dir.path().join("out");

    let tree = extract(&outer, &dest, "application/zip", &ExtractionConfig::default())
        .await
        .unwrap();

    assert_eq!(tree.root, dest);
    assert_eq!(
        relative_names(&dest, &tree.files),
        vec!["pkg/inner.zip", "pkg/nested_inner_1/payload.txt", "readme.txt"]
    );
}

#[tokio::test]
async fn test_extract_respects_depth_limit() {
    let temp_dir = TempDir::new().unwrap();
    let inner = temp_dir.path().join("inner.zip");
    create_zip_archive(&inner, &[("payload.txt", b"deep")]);
    let outer = temp_dir.path().join("outer.zip");
    create_zip_archive(&outer, &[("inner.zip", &std::fs::read(&inner).unwrap())]);
    let dest = temp_dir.path().join("out");

    let config = ExtractionConfig {
        max_recursion_depth: 0,
        ..Default::default()
    };
    let tree = extract(&outer, &dest, "application/zip", &config).await.unwrap();

    assert_eq!(relative_names(&dest, &tree.files), vec!["inner.zip"]);
}

#[tokio::test]
async fn test_extract_corrupt_nested_archive_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let outer = temp_dir.path().join("outer.zip");
    create_zip_archive(&outer, &[("broken.zip", b"not a zip at all")]);

    let result = extract(
        &outer,
        &temp_dir.path().join("out"),
        "application/zip",
        &ExtractionConfig::default(),
    )
    .await;

    assert!(matches!(
        result,
        Err(Error::Extraction(ExtractionError::Failed { .. }))
    ));
}

#[tokio::test]
async fn test_extract_leaves_plain_gz_member_alone() {
    let temp_dir = TempDir::new().unwrap();
    let outer = temp_dir.path().join("outer.zip");
    create_zip_archive(&outer, &[("dump.gz", b"\x1f\x8bcompressed")]);
    let dest = temp_dir.path().join("out");

    let tree = extract(&outer, &dest, "application/zip", &ExtractionConfig::default())
        .await
        .unwrap();

    assert_eq!(relative_names(&dest, &tree.files), vec!["dump.gz"]);
}
