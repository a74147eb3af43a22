use super::AnalysisBackend;
use crate::error::Result;
use crate::rate_limiter::IntervalGate;
use crate::types::AnalysisHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Handles produced by one request's submissions
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionBatch {
    /// One handle per successfully submitted file, in submission order
    pub handles: Vec<AnalysisHandle>,
    /// Files that could not be submitted
    pub skipped: Vec<PathBuf>,
}

/// Rate-limited uploader
///
/// Every submission waits for a slot on the shared submit gate, so concurrent
/// requests together never exceed the backend quota.
#[derive(Clone)]
pub struct Submitter {
    backend: Arc<dyn AnalysisBackend>,
    gate: IntervalGate,
}

impl Submitter {
    /// Create a submitter over a backend and the process-wide submit gate
    pub fn new(backend: Arc<dyn AnalysisBackend>, gate: IntervalGate) -> Self {
        Self { backend, gate }
    }

    /// Submit one file once its slot comes up
    pub async fn submit(&self, path: &Path) -> Result<AnalysisHandle> {
        self.gate.acquire().await;
        self.backend.submit(path).await
    }

    /// Submit files one after another
    ///
    /// A failed submission is logged and the file skipped; the batch carries on.
    pub async fn submit_all(&self, files: &[PathBuf]) -> SubmissionBatch {
        let mut batch = SubmissionBatch::default();

        for (index, path) in files.iter().enumerate() {
            match self.submit(path).await {
                Ok(handle) => {
                    info!(
                        ?path,
                        handle = %handle,
                        index = index + 1,
                        total = files.len(),
                        "submitted for analysis"
                    );
                    batch.handles.push(handle);
                }
                Err(e) => {
                    warn!(?path, error = %e, "submission failed, skipping file");
                    batch.skipped.push(path.clone());
                }
            }
        }

        batch
    }
}
