//! Completed-request summaries
//!
//! After each scan the gate publishes a [`ScanSummary`] onto a bounded queue.
//! Publishing never blocks the caller: the send happens on a spawned task and
//! gives up after `send_timeout` if the consumer is slow, or immediately if
//! it is gone.

use crate::config::EventConfig;
use crate::types::ScanSummary;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Producer side of the summary queue
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: mpsc::Sender<ScanSummary>,
    send_timeout: Duration,
}

impl EventBus {
    /// Create the bus and the receiver a consumer should drain
    pub fn new(config: &EventConfig) -> (Self, mpsc::Receiver<ScanSummary>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        (
            Self {
                tx,
                send_timeout: config.send_timeout,
            },
            rx,
        )
    }

    /// Hold `summary` back until the returned guard is dropped
    pub fn defer(&self, summary: ScanSummary) -> DeferredSummary {
        DeferredSummary {
            bus: self.clone(),
            summary: Some(summary),
        }
    }

    /// Queue a summary without waiting for the consumer (fire and forget)
    pub fn publish(&self, summary: ScanSummary) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let send_timeout = self.send_timeout;

        tokio::spawn(async move {
            let request_id = summary.request_id;
            match tx.send_timeout(summary, send_timeout).await {
                Ok(()) => debug!(%request_id, "summary queued"),
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!(%request_id, ?send_timeout, "summary queue full, dropping summary")
                }
                Err(SendTimeoutError::Closed(_)) => {
                    debug!(%request_id, "no summary consumer, dropping summary")
                }
            }
        })
    }
}

/// A summary held back until its owner is dropped
///
/// The REST handler ties one of these to the response body, so the summary
/// is queued only once the body has been handed to the connection (or the
/// client went away). Dropping it outside a runtime logs and discards.
#[derive(Debug)]
pub struct DeferredSummary {
    bus: EventBus,
    summary: Option<ScanSummary>,
}

impl DeferredSummary {
    /// The summary that will be published
    pub fn summary(&self) -> Option<&ScanSummary> {
        self.summary.as_ref()
    }
}

impl Drop for DeferredSummary {
    fn drop(&mut self) {
        let Some(summary) = self.summary.take() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            self.bus.publish(summary);
        } else {
            warn!(request_id = %summary.request_id, "no runtime left, dropping summary");
        }
    }
}

/// Default consumer: log every summary at info level
pub fn spawn_summary_logger(mut rx: mpsc::Receiver<ScanSummary>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(summary) = rx.recv().await {
            info!(
                request_id = %summary.request_id,
                client_id = ?summary.client_id,
                source_url = %summary.source_url,
                filename = ?summary.filename,
                mime = %summary.mime,
                safe = summary.safe,
                files_scanned = summary.files_scanned,
                files_skipped = summary.files_skipped,
                sha256 = ?summary.sha256,
                error = ?summary.error,
                "scan finished"
            );
        }
        debug!("summary channel closed, logger exiting");
    })
}
