//! Error types for download-gate
//!
//! This module provides error handling for the whole pipeline, including:
//! - Domain-specific error types (Fetch, Extraction, Scan)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes
//!
//! Errors that would let a user download an unscanned artifact are fatal and
//! propagate to the caller. Bookkeeping failures (cleanup, a single incomplete
//! analysis) never surface here; they degrade to an unsafe verdict or a warning.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for download-gate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for download-gate
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "API_KEY")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error talking to an external service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Retrieving the source file failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Unpacking the fetched archive failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Talking to the analysis backend failed
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// One-shot token is unknown or already consumed
    #[error("not found: {0}")]
    NotFound(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while retrieving the remote resource
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source URL could not be parsed
    #[error("invalid source URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as supplied by the caller
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The source answered with a non-2xx status
    #[error("source {url} answered with status {status}")]
    Status {
        /// The URL that was requested
        url: String,
        /// HTTP status code returned
        status: u16,
    },

    /// The request could not be completed (DNS, connect, timeout, body read)
    #[error("failed to fetch {url}: {reason}")]
    Transport {
        /// The URL that was requested
        url: String,
        /// Underlying transport failure
        reason: String,
    },

    /// The response body could not be written to local storage
    #[error("failed to write {path}: {reason}")]
    Write {
        /// Destination path of the artifact
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },
}

/// Errors raised while unpacking an archive
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Neither the declared MIME nor the extension identifies a supported format
    #[error("unsupported archive format for {archive}")]
    UnknownFormat {
        /// The archive that could not be classified
        archive: PathBuf,
    },

    /// The archive is corrupt or the extractor failed
    #[error("extraction failed for {archive}: {reason}")]
    Failed {
        /// The archive that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// An entry resolved outside of the extraction root
    #[error("entry {path} of {archive} escapes the extraction root")]
    UnsafePath {
        /// The archive containing the entry
        archive: PathBuf,
        /// The offending entry path
        path: PathBuf,
    },
}

/// Errors raised while talking to the analysis backend
#[derive(Debug, Error)]
pub enum ScanError {
    /// Uploading one file failed; the file is skipped
    #[error("submission of {path} failed: {reason}")]
    Submission {
        /// The file that could not be submitted
        path: PathBuf,
        /// Why the submission failed
        reason: String,
    },

    /// One poll of an analysis handle failed
    #[error("polling {handle} failed: {reason}")]
    Poll {
        /// The analysis handle being polled
        handle: String,
        /// Why the poll failed
        reason: String,
    },

    /// The backend answered with JSON we could not interpret
    #[error("malformed backend response: {reason}")]
    MalformedResponse {
        /// What was missing or wrong
        reason: String,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "token_not_found",
///     "message": "not found: one-shot token",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "fetch_failed")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Fetch(FetchError::InvalidUrl { .. }) => 400,

            Error::NotFound(_) => 404,

            // The archive itself is the problem, not the server
            Error::Extraction(_) => 422,

            // Upstream source or analysis backend misbehaved
            Error::Fetch(_) => 502,
            Error::Network(_) => 502,
            Error::Scan(_) => 502,

            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Fetch(e) => match e {
                FetchError::InvalidUrl { .. } => "invalid_url",
                FetchError::Status { .. } => "fetch_bad_status",
                FetchError::Transport { .. } => "fetch_failed",
                FetchError::Write { .. } => "fetch_write_failed",
            },
            Error::Extraction(e) => match e {
                ExtractionError::UnknownFormat { .. } => "unsupported_archive",
                ExtractionError::Failed { .. } => "extraction_failed",
                ExtractionError::UnsafePath { .. } => "unsafe_archive_entry",
            },
            Error::Scan(e) => match e {
                ScanError::Submission { .. } => "submission_failed",
                ScanError::Poll { .. } => "poll_failed",
                ScanError::MalformedResponse { .. } => "malformed_backend_response",
            },
            Error::NotFound(_) => "token_not_found",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Fetch(FetchError::Status { url, status }) => Some(serde_json::json!({
                "url": url,
                "status": status,
            })),
            Error::Extraction(ExtractionError::Failed { archive, .. })
            | Error::Extraction(ExtractionError::UnknownFormat { archive }) => {
                Some(serde_json::json!({
                    "archive": archive.file_name().map(|n| n.to_string_lossy().into_owned()),
                }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
