//! Source retrieval
//!
//! One GET per request, no retries. The body is streamed to disk under the
//! request's archive or payload directory depending on how the declared MIME
//! classifies it, hashing as it goes.

use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use crate::naming::resolve_filename;
use crate::storage::RequestWorkspace;
use crate::types::{ScanRequest, StoredArtifact};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// MIME substrings that mark a download as an archive
const ARCHIVE_MIME_MARKERS: [&str; 4] = ["zip", "rar", "tar", "7z"];

/// Whether a declared MIME type classifies the download as an archive
///
/// Case-insensitive substring match, so `application/x-zip-compressed` and
/// `application/vnd.rar` both count while `image/png` does not.
pub fn is_archive_mime(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    ARCHIVE_MIME_MARKERS.iter().any(|marker| mime.contains(marker))
}

/// Downloads source files into a request workspace
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher with the configured timeout and user agent
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch `request.source_url` into `workspace`
    ///
    /// # Errors
    ///
    /// Any transport failure, a non-2xx status or a failed disk write is
    /// returned as a [`FetchError`]; the caller treats all of them as fatal.
    pub async fn fetch(
        &self,
        request: &ScanRequest,
        workspace: &RequestWorkspace,
    ) -> Result<StoredArtifact> {
        let source_url = &request.source_url;
        url::Url::parse(source_url).map_err(|e| FetchError::InvalidUrl {
            url: source_url.clone(),
            reason: e.to_string(),
        })?;

        let mut response = self.client.get(source_url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "timed out".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            };
            FetchError::Transport {
                url: source_url.clone(),
                reason,
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: source_url.clone(),
                status: response.status().as_u16(),
            }
            .into());
        }

        let is_archive = is_archive_mime(&request.declared_mime);
        let filename = resolve_filename(
            response.headers(),
            &request.suggested_filename,
            &request.declared_mime,
            source_url,
        )
        .into_string();
        let local_path = workspace.dir_for(is_archive).join(&filename);

        let mut file = tokio::fs::File::create(&local_path)
            .await
            .map_err(|e| write_error(&local_path, e))?;
        let mut hasher = Sha256::new();
        let mut size_bytes = 0u64;

        loop {
            let chunk = response.chunk().await.map_err(|e| FetchError::Transport {
                url: source_url.clone(),
                reason: format!("body read failed: {}", e),
            })?;
            let Some(chunk) = chunk else { break };

            hasher.update(&chunk);
            size_bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| write_error(&local_path, e))?;
        }
        file.flush().await.map_err(|e| write_error(&local_path, e))?;

        let sha256 = format!("{:x}", hasher.finalize());
        debug!(request_id = %workspace.id, %sha256, "body hashed");
        info!(
            request_id = %workspace.id,
            path = ?local_path,
            size_bytes,
            is_archive,
            "fetched source"
        );

        Ok(StoredArtifact {
            local_path,
            is_archive,
            filename,
            size_bytes,
            sha256,
        })
    }
}

fn write_error(path: &Path, e: std::io::Error) -> FetchError {
    FetchError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
