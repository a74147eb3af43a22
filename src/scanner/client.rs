use super::{AnalysisBackend, AnalysisReport, STATUS_COMPLETED};
use crate::config::ScannerConfig;
use crate::error::{Error, Result, ScanError};
use crate::types::AnalysisHandle;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Header carrying the API key
const API_KEY_HEADER: &str = "x-apikey";

/// VirusTotal v3 file-analysis client
///
/// One `reqwest::Client` with the configured per-call timeout is shared by
/// both operations. The API key is sent on every call and never logged.
#[derive(Clone)]
pub struct VirusTotalClient {
    client: reqwest::Client,
    submit_url: String,
    api_key: String,
}

impl std::fmt::Debug for VirusTotalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirusTotalClient")
            .field("submit_url", &self.submit_url)
            .finish_non_exhaustive()
    }
}

impl VirusTotalClient {
    /// Build a client from scanner settings
    pub fn new(config: &ScannerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            submit_url: config.submit_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn upload(&self, path: &Path) -> std::result::Result<AnalysisHandle, String> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| format!("failed to open file: {}", e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| format!("failed to stat file: {}", e))?
            .len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let form = Form::new().part("file", Part::stream_with_length(body, len).file_name(file_name));

        let response = self
            .client
            .post(&self.submit_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("backend answered with status {}", status.as_u16()));
        }

        let body: SubmissionResponse = response
            .json()
            .await
            .map_err(|e| format!("undecodable submission response: {}", e))?;

        let url = body
            .data
            .links
            .self_link
            .filter(|l| !l.is_empty())
            .ok_or_else(|| "submission response has no analysis link".to_string())?;

        Ok(AnalysisHandle {
            url,
            path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl AnalysisBackend for VirusTotalClient {
    async fn submit(&self, path: &Path) -> Result<AnalysisHandle> {
        let handle = self.upload(path).await.map_err(|reason| {
            Error::Scan(ScanError::Submission {
                path: path.to_path_buf(),
                reason,
            })
        })?;
        debug!(?path, handle = %handle, "file submitted");
        Ok(handle)
    }

    async fn fetch_report(&self, handle: &AnalysisHandle) -> Result<AnalysisReport> {
        let poll_error = |reason: String| {
            Error::Scan(ScanError::Poll {
                handle: handle.url.clone(),
                reason,
            })
        };

        let response = self
            .client
            .get(&handle.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| poll_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(poll_error(format!(
                "backend answered with status {}",
                status.as_u16()
            )));
        }

        let text = response.text().await.map_err(|e| poll_error(e.to_string()))?;
        let body: AnalysisResponse = serde_json::from_str(&text).map_err(|e| {
            Error::Scan(ScanError::MalformedResponse {
                reason: e.to_string(),
            })
        })?;

        let attributes = body.data.attributes;
        let counts = attributes
            .stats
            .and_then(|stats| stats.malicious.zip(stats.suspicious));
        let (malicious, suspicious) = match counts {
            Some(counts) => counts,
            // a finished analysis without counts must not read as clean
            None if attributes.status == STATUS_COMPLETED => {
                return Err(Error::Scan(ScanError::MalformedResponse {
                    reason: "completed analysis carries no detection counts".to_string(),
                }));
            }
            None => (0, 0),
        };

        Ok(AnalysisReport {
            status: attributes.status,
            malicious,
            suspicious,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmissionResponse {
    data: SubmissionData,
}

#[derive(Debug, Deserialize)]
struct SubmissionData {
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(rename = "self")]
    self_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    data: AnalysisData,
}

#[derive(Debug, Deserialize)]
struct AnalysisData {
    attributes: AnalysisAttributes,
}

#[derive(Debug, Deserialize)]
struct AnalysisAttributes {
    status: String,
    stats: Option<AnalysisStats>,
}

#[derive(Debug, Deserialize)]
struct AnalysisStats {
    malicious: Option<u32>,
    suspicious: Option<u32>,
}
