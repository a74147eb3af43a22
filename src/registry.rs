//! One-shot delivery registry
//!
//! Maps unguessable tokens to the single surviving artifact of a safe request.
//! A lookup removes the entry under the same lock, so a token can be redeemed
//! exactly once no matter how many callers race for it.

use crate::types::OneShotToken;
use rand::RngCore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Random bytes per token (hex-encoded to twice as many characters)
const TOKEN_BYTES: usize = 32;

/// Token → path map with atomic consume
///
/// Critical sections are a single map operation; no I/O happens under the lock.
#[derive(Debug, Default)]
pub struct OneShotRegistry {
    entries: Mutex<HashMap<String, PathBuf>>,
}

impl OneShotRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path and return a fresh token for it
    ///
    /// Ownership of the file passes to the registry: nothing else may touch
    /// `path` until the token is consumed.
    pub fn register(&self, path: &Path) -> OneShotToken {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let token = loop {
            let candidate = generate_token();
            if !entries.contains_key(&candidate) {
                break candidate;
            }
            warn!("token collision, regenerating");
        };
        entries.insert(token.clone(), path.to_path_buf());
        drop(entries);

        debug!(?path, "registered one-shot entry");
        OneShotToken(token)
    }

    /// Take the path for a token, removing the entry
    ///
    /// Returns None for unknown or already-consumed tokens.
    pub fn consume(&self, token: &str) -> Option<PathBuf> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(token)
    }

    /// Entries registered but not yet consumed
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether no entries are waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
