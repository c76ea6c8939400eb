//! In-memory token store
//!
//! Holds the session's tokens and the CSRF `state` values handed out with
//! authorization URLs. Token reads and writes go through a lock; refreshes
//! additionally serialize on [`TokenStore::refresh_gate`] so concurrent
//! requests that all see an expired token trigger a single refresh.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::token::{TokenInfo, mask_token};

/// How long an issued `state` stays valid
pub const STATE_TTL: Duration = Duration::from_secs(600);

/// Upper bound on outstanding `state` values; the oldest is evicted beyond it
pub const MAX_PENDING_STATES: usize = 1000;

/// Session token storage shared by all request handlers
pub struct TokenStore {
    current: RwLock<Option<TokenInfo>>,
    pending_states: Mutex<HashMap<String, Instant>>,
    refresh_gate: tokio::sync::Mutex<()>,
    state_ttl: Duration,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    /// Create an empty (unauthenticated) store
    #[must_use]
    pub fn new() -> Self {
        Self::with_state_ttl(STATE_TTL)
    }

    /// Create an empty store with a custom `state` lifetime
    #[must_use]
    pub fn with_state_ttl(state_ttl: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            pending_states: Mutex::new(HashMap::new()),
            refresh_gate: tokio::sync::Mutex::new(()),
            state_ttl,
        }
    }

    /// Whether an access token is held
    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    /// Snapshot of the current tokens
    pub fn tokens(&self) -> Option<TokenInfo> {
        self.current.read().clone()
    }

    /// Current access token
    pub fn access_token(&self) -> Option<String> {
        self.current.read().as_ref().map(|t| t.access_token.clone())
    }

    /// Current refresh token
    pub fn refresh_token(&self) -> Option<String> {
        self.current
            .read()
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
    }

    /// Replace the stored tokens
    pub fn set(&self, token: TokenInfo) {
        info!(
            access_token = %mask_token(&token.access_token),
            expires_in = ?token.time_until_expiry(),
            has_refresh_token = token.refresh_token.is_some(),
            "Stored new tokens"
        );
        *self.current.write() = Some(token);
    }

    /// Drop all tokens, forcing a new authorization
    pub fn clear(&self) {
        if self.current.write().take().is_some() {
            info!("Cleared stored tokens");
        }
    }

    /// Replace the stored tokens only if `access_token` is still the current one.
    ///
    /// Returns `false` (leaving the store untouched) when another session was
    /// stored in the meantime.
    pub fn replace_if_current(&self, access_token: &str, token: TokenInfo) -> bool {
        let mut current = self.current.write();
        if current.as_ref().map(|t| t.access_token.as_str()) != Some(access_token) {
            return false;
        }
        info!(
            access_token = %mask_token(&token.access_token),
            expires_in = ?token.time_until_expiry(),
            "Stored refreshed tokens"
        );
        *current = Some(token);
        true
    }

    /// Drop the tokens only if `access_token` is still the current one
    pub fn clear_if_current(&self, access_token: &str) -> bool {
        let mut current = self.current.write();
        if current.as_ref().map(|t| t.access_token.as_str()) != Some(access_token) {
            return false;
        }
        *current = None;
        info!("Cleared stored tokens");
        true
    }

    /// Lock serializing token writes: refreshes, code exchanges and
    /// non-interactive authorization
    pub fn refresh_gate(&self) -> &tokio::sync::Mutex<()> {
        &self.refresh_gate
    }

    /// Remember a `state` handed out with an authorization URL
    pub fn issue_state(&self, state: &str) {
        let mut states = self.pending_states.lock();
        let ttl = self.state_ttl;
        states.retain(|_, issued| issued.elapsed() < ttl);
        while states.len() >= MAX_PENDING_STATES {
            let Some(oldest) = states
                .iter()
                .min_by_key(|(_, issued)| **issued)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            states.remove(&oldest);
        }
        states.insert(state.to_string(), Instant::now());
        debug!(pending = states.len(), "Issued authorization state");
    }

    /// Consume a `state` received on the callback.
    ///
    /// Returns `false` when the state was never issued, was already used,
    /// or has expired.
    pub fn take_state(&self, state: &str) -> bool {
        let mut states = self.pending_states.lock();
        states
            .remove(state)
            .is_some_and(|issued| issued.elapsed() < self.state_ttl)
    }
}
