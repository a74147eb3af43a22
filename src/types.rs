//! Core types for download-gate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use utoipa::ToSchema;

/// Unique identifier for one scan request
///
/// Also names the request's private subdirectories in the temp hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Allocate the next id (unique within this process)
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Directory name used for this request's storage
    pub fn dir_name(&self) -> String {
        format!("req-{}", self.0)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable input handed over by the HTTP layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Where to fetch the file from
    pub source_url: String,
    /// Filename the caller suggests (may be empty)
    #[serde(default)]
    pub suggested_filename: String,
    /// MIME type declared by the caller; drives archive classification
    #[serde(default)]
    pub declared_mime: String,
}

impl ScanRequest {
    /// Create a new scan request
    pub fn new(
        source_url: impl Into<String>,
        suggested_filename: impl Into<String>,
        declared_mime: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            suggested_filename: suggested_filename.into(),
            declared_mime: declared_mime.into(),
        }
    }
}

/// Archive families the extractor understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// ZIP archive
    Zip,
    /// RAR archive
    Rar,
    /// 7-Zip archive
    SevenZip,
    /// Plain tar
    Tar,
    /// Gzip-compressed tar
    TarGz,
}

/// A fetched file, owned by one request until nuked or handed to the registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Where the response body was written
    pub local_path: PathBuf,
    /// Whether the declared MIME classified it as an archive
    pub is_archive: bool,
    /// Sanitized name the file was stored under
    pub filename: String,
    /// Bytes written
    pub size_bytes: u64,
    /// Hex SHA-256 of the body
    pub sha256: String,
}

/// Result of unpacking an archive
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedTree {
    /// Directory everything was unpacked into
    pub root: PathBuf,
    /// Every regular file written, including nested extractions
    pub files: Vec<PathBuf>,
}

/// Backend-provided reference to one submitted file's analysis
///
/// This is the self link returned by the submission endpoint; polling GETs it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnalysisHandle {
    /// URL to poll
    pub url: String,
    /// File the analysis belongs to (for logging)
    pub path: PathBuf,
}

impl std::fmt::Display for AnalysisHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// Outcome of polling one analysis handle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Engines flagging the file as malicious
    pub malicious: u32,
    /// Engines flagging the file as suspicious
    pub suspicious: u32,
    /// Whether the backend reported the analysis as completed
    pub completed: bool,
}

impl Verdict {
    /// Verdict for a completed analysis
    pub fn completed(malicious: u32, suspicious: u32) -> Self {
        Self {
            malicious,
            suspicious,
            completed: true,
        }
    }

    /// Verdict for an analysis that never completed (counts as unsafe)
    pub fn incomplete() -> Self {
        Self::default()
    }

    /// Completed with nothing flagged
    pub fn is_clean(&self) -> bool {
        self.completed && self.malicious == 0 && self.suspicious == 0
    }
}

/// Opaque single-use credential for one retrieval
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OneShotToken(pub String);

impl OneShotToken {
    /// Borrow the token text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OneShotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What `handle_scan` hands back to the HTTP layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Request this outcome belongs to
    pub request_id: RequestId,
    /// Aggregate verdict
    pub is_safe: bool,
    /// One-shot link (empty when unsafe)
    pub one_shot_url: String,
    /// Token behind the link (None when unsafe)
    pub token: Option<OneShotToken>,
    /// Files whose verdict was collected
    pub files_scanned: usize,
    /// Files that could not be submitted
    pub files_skipped: usize,
}

/// A consumed one-shot retrieval, ready to be streamed to the client
///
/// `file` is an open handle to an already unlinked file, so the data stays
/// readable until the handle is dropped while nothing is left on disk.
#[derive(Debug)]
pub struct Retrieval {
    /// Name for the attachment header
    pub filename: String,
    /// Best-effort content type from the extension
    pub content_type: &'static str,
    /// Size of the file when it was opened
    pub size: u64,
    /// Open handle to the delivered file
    pub file: tokio::fs::File,
}

impl Retrieval {
    /// Chunked stream of the file contents
    pub fn into_stream(self) -> ReaderStream<tokio::fs::File> {
        ReaderStream::new(self.file)
    }

    /// Read the whole file into memory
    pub async fn into_bytes(mut self) -> std::io::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(usize::try_from(self.size).unwrap_or_default());
        self.file.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}

/// Summary of a finished request, pushed to the downstream consumer
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ScanSummary {
    /// Request the summary describes
    #[schema(value_type = u64)]
    pub request_id: RequestId,
    /// Caller-side correlation id, if the caller sent one
    pub client_id: Option<i64>,
    /// Source URL
    pub source_url: String,
    /// Resolved local filename (None if the fetch failed before naming)
    pub filename: Option<String>,
    /// Declared MIME
    pub mime: String,
    /// Aggregate verdict (false for failed requests)
    pub safe: bool,
    /// Files with a collected verdict
    pub files_scanned: usize,
    /// Files skipped after a submission error
    pub files_skipped: usize,
    /// SHA-256 of the fetched artifact
    pub sha256: Option<String>,
    /// Error message when the request failed outright
    pub error: Option<String>,
    /// When the pipeline finished
    #[schema(value_type = String, format = DateTime)]
    pub finished_at: DateTime<Utc>,
}

/// Guess a content type for the retrieval response from a file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "rar" => "application/vnd.rar",
        "7z" => "application/x-7z-compressed",
        "tar" => "application/x-tar",
        "gz" | "tgz" => "application/gzip",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
