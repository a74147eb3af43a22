//! Route handlers for the REST API
//!
//! - [`scan`] - Submission and one-shot retrieval
//! - [`system`] - Health and OpenAPI

use serde::{Deserialize, Serialize};

mod scan;
mod system;

pub use scan::*;
pub use system::*;

/// Request body for POST /submit-data
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitDataRequest {
    /// Caller-side correlation id, echoed into the scan summary
    #[serde(default)]
    pub id: Option<i64>,
    /// Where to download the file from
    pub url: String,
    /// Suggested filename (may be empty)
    #[serde(default)]
    pub filename: String,
    /// Declared MIME type; decides whether the file is unpacked
    #[serde(default)]
    pub mime: String,
}

/// Response for POST /submit-data
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitDataResponse {
    /// Whether every scanned file came back clean
    pub is_safe: bool,
    /// One-shot download link, empty when unsafe
    pub proxy_url: String,
}
