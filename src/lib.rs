//! # download-gate
//!
//! A gatekeeper for downloads. Given a URL, it fetches the file, unpacks it if
//! it is an archive, submits every file to a malware-analysis backend at a
//! rate the backend tolerates, and decides fail-closed whether the download
//! is safe. Unsafe material is deleted; a safe file is handed out through a
//! single-use link that deletes the file once it has been served.
//!
//! ## Quick Start
//!
//! ```no_run
//! use download_gate::{Config, Gatekeeper, ScanRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gate = Gatekeeper::new(Config::from_env()?)?;
//!
//!     let outcome = gate
//!         .handle_scan(ScanRequest::new(
//!             "https://example.com/tools.zip",
//!             "tools.zip",
//!             "application/zip",
//!         ))
//!         .await?;
//!
//!     if outcome.is_safe {
//!         println!("download at {}", outcome.one_shot_url);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Scan-root enumeration
pub mod enumerate;
/// Error types
pub mod error;
/// Completed-request summaries
pub mod events;
/// Archive extraction
pub mod extraction;
/// Source retrieval
pub mod fetch;
/// Pipeline orchestration
pub mod gate;
/// Local filename resolution
pub mod naming;
/// Fixed-interval pacing for backend calls
pub mod rate_limiter;
/// One-shot delivery registry
pub mod registry;
/// Malware analysis backend, submission and polling
pub mod scanner;
/// Temp hierarchy lifecycle
pub mod storage;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, EmptyScanPolicy};
pub use error::{
    ApiError, Error, ErrorDetail, ExtractionError, FetchError, Result, ScanError, ToHttpStatus,
};
pub use events::DeferredSummary;
pub use gate::Gatekeeper;
pub use scanner::{AnalysisBackend, VirusTotalClient};
pub use types::{OneShotToken, Retrieval, ScanOutcome, ScanRequest, ScanSummary, Verdict};

/// Resolve once the process is asked to stop.
///
/// - **Unix:** SIGTERM or SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Pass it to [`api::start_api_server`] for a graceful shutdown.
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Resolve once the process is asked to stop (Ctrl+C).
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
