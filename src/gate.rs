//! Pipeline orchestration
//!
//! [`Gatekeeper`] owns every long-lived component (both rate-limit gates, the
//! registry, storage, the summary bus) and runs one request end to end:
//!
//! ```text
//! fetch → extract (archives) → enumerate → submit → poll → aggregate
//!     unsafe / error: nuke the request's storage
//!     safe:           register the fetched file, return a one-shot URL
//! ```

use crate::config::Config;
use crate::enumerate::enumerate;
use crate::error::{Error, Result};
use crate::events::{DeferredSummary, EventBus};
use crate::extraction;
use crate::fetch::Fetcher;
use crate::rate_limiter::IntervalGate;
use crate::registry::OneShotRegistry;
use crate::scanner::{AnalysisBackend, Poller, Submitter, VirusTotalClient, aggregate};
use crate::storage::{RequestWorkspace, StorageManager};
use crate::types::{
    RequestId, Retrieval, ScanOutcome, ScanRequest, ScanSummary, StoredArtifact,
    content_type_for,
};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// What one pipeline run produced before the verdict is acted on
struct PipelineRun {
    artifact: StoredArtifact,
    is_safe: bool,
    files_scanned: usize,
    files_skipped: usize,
}

/// The download gatekeeper
///
/// Cheap to share behind an `Arc`; every request runs on the caller's task and
/// only contends with others on the two backend gates and the registry lock.
pub struct Gatekeeper {
    config: Config,
    storage: StorageManager,
    fetcher: Fetcher,
    submitter: Submitter,
    poller: Poller,
    registry: OneShotRegistry,
    events: EventBus,
    summaries: Mutex<Option<mpsc::Receiver<ScanSummary>>>,
}

impl Gatekeeper {
    /// Build a gatekeeper talking to VirusTotal
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration, or an error if
    /// an HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let backend = Arc::new(VirusTotalClient::new(&config.scanner)?);
        Self::with_backend(config, backend)
    }

    /// Build a gatekeeper over any analysis backend
    pub fn with_backend(config: Config, backend: Arc<dyn AnalysisBackend>) -> Result<Self> {
        config.validate()?;

        let submit_gate = IntervalGate::new("submit", config.scanner.submit_interval);
        let poll_gate = IntervalGate::new("poll", config.scanner.poll_interval);
        let (events, summaries) = EventBus::new(&config.events);

        Ok(Self {
            storage: StorageManager::new(&config.storage),
            fetcher: Fetcher::new(&config.fetch)?,
            submitter: Submitter::new(Arc::clone(&backend), submit_gate),
            poller: Poller::new(
                backend,
                poll_gate,
                config.scanner.max_poll_attempts,
                config.scanner.poll_retry_delay,
            ),
            registry: OneShotRegistry::new(),
            events,
            summaries: Mutex::new(Some(summaries)),
            config,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The one-shot registry
    pub fn registry(&self) -> &OneShotRegistry {
        &self.registry
    }

    /// The storage manager
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Take the receiving end of the summary queue
    ///
    /// Returns None after the first call.
    pub fn take_summaries(&self) -> Option<mpsc::Receiver<ScanSummary>> {
        self.summaries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Scan a download and decide whether it may be handed out
    pub async fn handle_scan(&self, request: ScanRequest) -> Result<ScanOutcome> {
        self.handle_scan_with_client_id(request, None).await
    }

    /// [`Self::handle_scan`] with the caller's correlation id carried into the summary
    pub async fn handle_scan_with_client_id(
        &self,
        request: ScanRequest,
        client_id: Option<i64>,
    ) -> Result<ScanOutcome> {
        // dropping the guard queues the summary right away
        let (outcome, _summary) = self.handle_scan_deferred(request, client_id).await;
        outcome
    }

    /// Scan like [`Self::handle_scan_with_client_id`] but hand the summary back
    ///
    /// The summary is queued when the returned [`DeferredSummary`] is dropped,
    /// which lets the HTTP layer hold it until the response is out.
    pub async fn handle_scan_deferred(
        &self,
        request: ScanRequest,
        client_id: Option<i64>,
    ) -> (Result<ScanOutcome>, DeferredSummary) {
        let request_id = RequestId::next();
        info!(
            %request_id,
            url = %request.source_url,
            mime = %request.declared_mime,
            "scan requested"
        );

        let mut summary = ScanSummary {
            request_id,
            client_id,
            source_url: request.source_url.clone(),
            filename: None,
            mime: request.declared_mime.clone(),
            safe: false,
            files_scanned: 0,
            files_skipped: 0,
            sha256: None,
            error: None,
            finished_at: chrono::Utc::now(),
        };

        let result = self.scan(request_id, &request).await;

        let outcome = match result {
            Ok((run, workspace)) => {
                summary.filename = Some(run.artifact.filename.clone());
                summary.sha256 = Some(run.artifact.sha256.clone());
                summary.safe = run.is_safe;
                summary.files_scanned = run.files_scanned;
                summary.files_skipped = run.files_skipped;
                Ok(self.conclude(run, &workspace).await)
            }
            Err(e) => {
                error!(%request_id, error = %e, "scan failed");
                summary.error = Some(e.to_string());
                Err(e)
            }
        };

        summary.finished_at = chrono::Utc::now();
        (outcome, self.events.defer(summary))
    }

    /// Run the pipeline; on error the request's storage is already gone
    async fn scan(
        &self,
        request_id: RequestId,
        request: &ScanRequest,
    ) -> Result<(PipelineRun, RequestWorkspace)> {
        let workspace = self.storage.prepare(request_id).await?;

        match self.run_pipeline(request, &workspace).await {
            Ok(run) => Ok((run, workspace)),
            Err(e) => {
                self.storage.nuke(&workspace).await;
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &ScanRequest,
        workspace: &RequestWorkspace,
    ) -> Result<PipelineRun> {
        let artifact = self.fetcher.fetch(request, workspace).await?;

        if artifact.is_archive {
            let tree = extraction::extract(
                &artifact.local_path,
                workspace.scan_root(),
                &request.declared_mime,
                &self.config.extraction,
            )
            .await?;
            info!(request_id = %workspace.id, extracted = tree.files.len(), "archive unpacked");
        }

        let root = workspace.scan_root().to_path_buf();
        let files = tokio::task::spawn_blocking(move || enumerate(&root))
            .await
            .map_err(|e| Error::Other(format!("enumeration task panicked: {}", e)))??;

        let batch = self.submitter.submit_all(&files).await;
        let verdicts = self.poller.poll_all(&batch.handles).await;
        let is_safe = aggregate(&verdicts, self.config.scanner.empty_scan_policy);

        if verdicts.is_empty() {
            warn!(
                request_id = %workspace.id,
                files = files.len(),
                skipped = batch.skipped.len(),
                policy = ?self.config.scanner.empty_scan_policy,
                "nothing was analysed"
            );
        }

        Ok(PipelineRun {
            artifact,
            is_safe,
            files_scanned: verdicts.len(),
            files_skipped: batch.skipped.len(),
        })
    }

    /// Act on the verdict: destroy, or hand the artifact to the registry
    async fn conclude(&self, run: PipelineRun, workspace: &RequestWorkspace) -> ScanOutcome {
        let request_id = workspace.id;

        if !run.is_safe {
            info!(%request_id, "verdict unsafe, destroying fetched material");
            self.storage.nuke(workspace).await;
            return ScanOutcome {
                request_id,
                is_safe: false,
                one_shot_url: String::new(),
                token: None,
                files_scanned: run.files_scanned,
                files_skipped: run.files_skipped,
            };
        }

        self.storage
            .keep_only(workspace, run.artifact.is_archive)
            .await;

        let token = self.registry.register(&run.artifact.local_path);
        let one_shot_url = format!(
            "{}/safe/{}",
            self.config.api.public_base_url.trim_end_matches('/'),
            token
        );
        info!(%request_id, filename = %run.artifact.filename, "verdict safe, one-shot link issued");

        ScanOutcome {
            request_id,
            is_safe: true,
            one_shot_url,
            token: Some(token),
            files_scanned: run.files_scanned,
            files_skipped: run.files_skipped,
        }
    }

    /// Redeem a one-shot token
    ///
    /// The token is consumed before anything else, so a second call with the
    /// same token fails even while the first is still reading. The file and
    /// its empty parent directories are removed once read.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown, consumed, or orphaned token.
    pub async fn handle_retrieve(&self, token: &str) -> Result<Retrieval> {
        let path = self
            .registry
            .consume(token)
            .ok_or_else(|| Error::NotFound("one-shot token".to_string()))?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());

        // opened before the unlink; the handle keeps the data readable
        let opened = open_with_size(&path).await;
        self.storage.release_served(&path).await;

        let (file, size) = match opened {
            Ok(opened) => opened,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(?path, "registered file vanished before delivery");
                return Err(Error::NotFound("one-shot token".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        info!(%filename, size, "one-shot delivery served");
        Ok(Retrieval {
            content_type: content_type_for(&path),
            filename,
            size,
            file,
        })
    }
}

async fn open_with_size(path: &Path) -> std::io::Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let size = file.metadata().await?.len();
    Ok((file, size))
}
