//! Test configuration helpers

use download_gate::config::{ScannerConfig, StorageConfig};
use download_gate::{Config, Gatekeeper};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Pacing used by every integration test: the production seconds become milliseconds
pub const TEST_SUBMIT_INTERVAL: Duration = Duration::from_millis(40);
/// Poll gate interval in tests
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Poll budget in tests
pub const TEST_POLL_ATTEMPTS: u32 = 4;

/// Config pointing the scanner at `backend` and storage into `temp`
pub fn test_config(temp: &TempDir, backend: &MockServer) -> Config {
    let mut scanner = ScannerConfig::with_api_key("integration-key");
    scanner.submit_url = format!("{}/api/v3/files", backend.uri());
    scanner.submit_interval = TEST_SUBMIT_INTERVAL;
    scanner.poll_interval = TEST_POLL_INTERVAL;
    scanner.poll_retry_delay = Duration::from_millis(5);
    scanner.max_poll_attempts = TEST_POLL_ATTEMPTS;
    scanner.request_timeout = Duration::from_secs(5);

    let mut config = Config {
        storage: StorageConfig {
            temp_root: temp.path().join("temp"),
            ..Default::default()
        },
        scanner,
        ..Default::default()
    };
    config.api.public_base_url = "https://gate.test".to_string();
    config
}

/// Gatekeeper wired to the real VirusTotal client against `backend`
pub fn create_test_gate(backend: &MockServer) -> (Gatekeeper, TempDir) {
    let temp = tempfile::tempdir().expect("temp dir");
    let gate = Gatekeeper::new(test_config(&temp, backend)).expect("gatekeeper");
    (gate, temp)
}
