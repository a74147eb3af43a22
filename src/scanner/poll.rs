use super::AnalysisBackend;
use crate::rate_limiter::IntervalGate;
use crate::types::{AnalysisHandle, Verdict};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rate-limited, bounded-retry verdict poller
///
/// Each attempt waits for a slot on the shared poll gate. A handle that never
/// reports "completed" within `max_attempts`, or whose poll fails outright,
/// resolves to [`Verdict::incomplete`], which the aggregator treats as unsafe.
#[derive(Clone)]
pub struct Poller {
    backend: Arc<dyn AnalysisBackend>,
    gate: IntervalGate,
    max_attempts: u32,
    retry_delay: Duration,
}

impl Poller {
    /// Create a poller
    ///
    /// # Arguments
    ///
    /// * `backend` - Analysis backend to query
    /// * `gate` - Process-wide poll gate
    /// * `max_attempts` - Polls per handle before giving up
    /// * `retry_delay` - Extra pause after a non-completed poll, on top of the gate
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        gate: IntervalGate,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            backend,
            gate,
            max_attempts,
            retry_delay,
        }
    }

    /// Resolve one handle to a verdict
    pub async fn poll(&self, handle: &AnalysisHandle) -> Verdict {
        for attempt in 1..=self.max_attempts {
            self.gate.acquire().await;

            match self.backend.fetch_report(handle).await {
                Ok(report) => {
                    if let Some(verdict) = report.verdict() {
                        info!(
                            path = ?handle.path,
                            attempt,
                            malicious = verdict.malicious,
                            suspicious = verdict.suspicious,
                            "analysis completed"
                        );
                        return verdict;
                    }
                    debug!(
                        handle = %handle,
                        attempt,
                        max_attempts = self.max_attempts,
                        status = %report.status,
                        "analysis not finished yet"
                    );
                }
                Err(e) => {
                    warn!(handle = %handle, attempt, error = %e, "poll failed, treating file as unsafe");
                    return Verdict::incomplete();
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(
            path = ?handle.path,
            attempts = self.max_attempts,
            "analysis did not complete in time, treating file as unsafe"
        );
        Verdict::incomplete()
    }

    /// Resolve all handles concurrently; the gate serializes the actual GETs
    pub async fn poll_all(&self, handles: &[AnalysisHandle]) -> Vec<Verdict> {
        join_all(handles.iter().map(|handle| self.poll(handle))).await
    }
}
