use download_gate::events::spawn_summary_logger;
use download_gate::{Config, Gatekeeper, api, wait_for_signal};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("download_gate=info,tower_http=info")),
        )
        .init();

    // a missing API key is the one startup failure we refuse to run with
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let gate = match Gatekeeper::new(config) {
        Ok(gate) => Arc::new(gate),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialise gatekeeper");
            return ExitCode::FAILURE;
        }
    };

    if let Some(summaries) = gate.take_summaries() {
        spawn_summary_logger(summaries);
    }

    match api::start_api_server(gate, wait_for_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "API server failed");
            ExitCode::FAILURE
        }
    }
}
