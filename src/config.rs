//! Configuration types for download-gate

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Environment variable holding the analysis backend API key (required)
pub const API_KEY_VAR: &str = "API_KEY";
/// Optional override for [`ApiConfig::bind_address`]
pub const BIND_VAR: &str = "DOWNLOAD_GATE_BIND";
/// Optional override for [`StorageConfig::temp_root`]
pub const TEMP_DIR_VAR: &str = "DOWNLOAD_GATE_TEMP_DIR";
/// Optional override for [`ApiConfig::public_base_url`]
pub const PUBLIC_URL_VAR: &str = "DOWNLOAD_GATE_PUBLIC_URL";

/// Main configuration for the gatekeeper
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Temp hierarchy layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Analysis backend access and pacing
    pub scanner: ScannerConfig,

    /// Source fetching
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Archive unpacking
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Completed-request summary queue
    #[serde(default)]
    pub events: EventConfig,

    /// HTTP surface
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Build a configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    /// `API_KEY` is required; its absence is the only condition that should
    /// abort the process at startup.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(?path, "loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env file"),
        }

        let api_key = std::env::var(API_KEY_VAR).map_err(|_| Error::Config {
            message: format!("{API_KEY_VAR} is not set"),
            key: Some(API_KEY_VAR.to_string()),
        })?;

        let mut config = Config {
            scanner: ScannerConfig::with_api_key(api_key),
            ..Default::default()
        };

        if let Ok(bind) = std::env::var(BIND_VAR) {
            config.api.bind_address = bind.parse().map_err(|e| Error::Config {
                message: format!("invalid bind address {bind:?}: {e}"),
                key: Some(BIND_VAR.to_string()),
            })?;
        }
        if let Ok(dir) = std::env::var(TEMP_DIR_VAR) {
            config.storage.temp_root = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var(PUBLIC_URL_VAR) {
            config.api.public_base_url = url.trim_end_matches('/').to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.scanner.api_key.trim().is_empty() {
            return Err(Error::Config {
                message: "API key must not be empty".to_string(),
                key: Some(API_KEY_VAR.to_string()),
            });
        }
        if self.scanner.submit_interval.is_zero() || self.scanner.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "rate-limit intervals must be greater than zero".to_string(),
                key: Some("scanner.submit_interval".to_string()),
            });
        }
        if self.scanner.max_poll_attempts == 0 {
            return Err(Error::Config {
                message: "max_poll_attempts must be at least 1".to_string(),
                key: Some("scanner.max_poll_attempts".to_string()),
            });
        }
        if self.storage.archive_dir == self.storage.payload_dir {
            return Err(Error::Config {
                message: "archive and payload directories must differ".to_string(),
                key: Some("storage.archive_dir".to_string()),
            });
        }
        Ok(())
    }
}

/// Temp hierarchy layout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the temp hierarchy (default: "temp")
    #[serde(default = "default_temp_root")]
    pub temp_root: PathBuf,

    /// Child directory for originally-fetched archives (default: "compressed")
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,

    /// Child directory for plain and extracted payloads (default: "uncompressed")
    #[serde(default = "default_payload_dir")]
    pub payload_dir: String,

    /// Maximum ancestor levels pruned after a delivery (default: 5)
    #[serde(default = "default_max_prune_depth")]
    pub max_prune_depth: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            archive_dir: default_archive_dir(),
            payload_dir: default_payload_dir(),
            max_prune_depth: default_max_prune_depth(),
        }
    }
}

/// What to conclude when a request produced no verdicts at all
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyScanPolicy {
    /// Nothing was analysed, so nothing can be vouched for (default)
    #[default]
    Unsafe,
    /// Vacuous truth: no file reported anything malicious
    Safe,
}

/// Analysis backend access and pacing
#[derive(Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Pre-provisioned API key sent as `x-apikey`
    pub api_key: String,

    /// File submission endpoint
    #[serde(default = "default_submit_url")]
    pub submit_url: String,

    /// Minimum spacing between two submissions, process-wide (default: 15s)
    #[serde(default = "default_submit_interval")]
    pub submit_interval: Duration,

    /// Minimum spacing between two polls, process-wide (default: 3s)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Extra pause after a non-completed poll (default: 5s)
    #[serde(default = "default_poll_retry_delay")]
    pub poll_retry_delay: Duration,

    /// Polls per handle before the file is forced unsafe (default: 15)
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Per-call timeout for backend requests (default: 10s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Outcome when zero files were analysed (default: unsafe)
    #[serde(default)]
    pub empty_scan_policy: EmptyScanPolicy,
}

impl ScannerConfig {
    /// Default pacing with the given key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            submit_url: default_submit_url(),
            submit_interval: default_submit_interval(),
            poll_interval: default_poll_interval(),
            poll_retry_delay: default_poll_retry_delay(),
            max_poll_attempts: default_max_poll_attempts(),
            request_timeout: default_request_timeout(),
            empty_scan_policy: EmptyScanPolicy::default(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self::with_api_key(String::new())
    }
}

// Hand-written so the key never ends up in logs
impl std::fmt::Debug for ScannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerConfig")
            .field("api_key", &"<redacted>")
            .field("submit_url", &self.submit_url)
            .field("submit_interval", &self.submit_interval)
            .field("poll_interval", &self.poll_interval)
            .field("poll_retry_delay", &self.poll_retry_delay)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("request_timeout", &self.request_timeout)
            .field("empty_scan_policy", &self.empty_scan_policy)
            .finish()
    }
}

/// Source fetching
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for the whole source download (default: 300s)
    #[serde(default = "default_fetch_timeout")]
    pub timeout: Duration,

    /// User-Agent sent to the source server
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Archive unpacking
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum depth for nested archive extraction (default: 2)
    #[serde(default = "default_max_recursion")]
    pub max_recursion_depth: u32,

    /// File extensions treated as nested archives (without dots)
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: default_max_recursion(),
            archive_extensions: default_archive_extensions(),
        }
    }
}

/// Completed-request summary queue
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventConfig {
    /// Queue capacity (default: 64)
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,

    /// Longest a publisher waits on a full queue before dropping (default: 5s)
    #[serde(default = "default_event_send_timeout")]
    pub send_timeout: Duration,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
            send_timeout: default_event_send_timeout(),
        }
    }
}

/// HTTP surface configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Base URL used when building one-shot links (default: "http://localhost:8080")
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Enable CORS for browser extensions (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_base_url: default_public_base_url(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_temp_root() -> PathBuf {
    PathBuf::from("temp")
}

fn default_archive_dir() -> String {
    "compressed".to_string()
}

fn default_payload_dir() -> String {
    "uncompressed".to_string()
}

fn default_max_prune_depth() -> usize {
    5
}

fn default_submit_url() -> String {
    "https://www.virustotal.com/api/v3/files".to_string()
}

fn default_submit_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_poll_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_max_poll_attempts() -> u32 {
    15
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_user_agent() -> String {
    concat!("download-gate/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_recursion() -> u32 {
    2
}

fn default_archive_extensions() -> Vec<String> {
    ["zip", "rar", "7z", "tar", "tgz", "gz"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_event_capacity() -> usize {
    64
}

fn default_event_send_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
