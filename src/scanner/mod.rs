//! Malware analysis: submission, polling and verdict aggregation
//!
//! The backend is reached through the [`AnalysisBackend`] trait so the
//! pacing and fail-closed logic in [`Submitter`] and [`Poller`] can be
//! exercised without a network. [`VirusTotalClient`] is the production
//! implementation.

mod client;
mod poll;
mod submit;
mod verdict;

pub use client::VirusTotalClient;
pub use poll::Poller;
pub use submit::{SubmissionBatch, Submitter};
pub use verdict::aggregate;

use crate::error::Result;
use crate::types::{AnalysisHandle, Verdict};
use async_trait::async_trait;
use std::path::Path;

/// Status string the backend uses for a finished analysis
pub const STATUS_COMPLETED: &str = "completed";

/// One poll's view of an analysis
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    /// Backend status ("queued", "in-progress", "completed", ...)
    pub status: String,
    /// Engines flagging the file as malicious
    pub malicious: u32,
    /// Engines flagging the file as suspicious
    pub suspicious: u32,
}

impl AnalysisReport {
    /// Whether the analysis has finished
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    /// Verdict for a finished report, or None while still running
    pub fn verdict(&self) -> Option<Verdict> {
        self.is_completed()
            .then(|| Verdict::completed(self.malicious, self.suspicious))
    }
}

/// Trait for a malware-analysis backend
///
/// Implementations do a single network call per method and no pacing; rate
/// limiting belongs to the callers.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Upload one file and return the handle to poll
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ScanError::Submission`] when the file cannot be
    /// read or the backend rejects it.
    async fn submit(&self, path: &Path) -> Result<AnalysisHandle>;

    /// Fetch the current state of a submitted analysis
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ScanError::Poll`] on transport or HTTP failure
    /// and [`crate::error::ScanError::MalformedResponse`] for unexpected JSON.
    async fn fetch_report(&self, handle: &AnalysisHandle) -> Result<AnalysisReport>;
}
