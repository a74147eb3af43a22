//! Application state for the API server

use crate::gate::Gatekeeper;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned per request (one Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The gatekeeper running every scan and retrieval
    pub gate: Arc<Gatekeeper>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(gate: Arc<Gatekeeper>) -> Self {
        Self { gate }
    }
}
