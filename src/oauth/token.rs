//! OAuth token types
//!
//! [`TokenResponse`] is what the token endpoint returns; [`TokenInfo`] is the
//! form kept in the [`TokenStore`](super::TokenStore).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const MASK_PREFIX_LEN: usize = 6;
const MASK_SUFFIX_LEN: usize = 4;

/// OAuth token endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type (usually "Bearer")
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token, often omitted from refresh responses
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

/// OAuth token information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Access token
    pub access_token: String,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Refresh token (optional)
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Token expiration time (Unix timestamp)
    #[serde(default)]
    pub expires_at: Option<u64>,

    /// Granted scopes
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl From<TokenResponse> for TokenInfo {
    fn from(response: TokenResponse) -> Self {
        let expires_at = response.expires_in.map(|secs| now_secs() + secs);

        Self {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(default_token_type),
            refresh_token: response.refresh_token,
            expires_at,
            scope: response.scope,
        }
    }
}

impl TokenInfo {
    /// Apply a refresh response.
    ///
    /// The previous refresh token is kept unless the provider rotated it.
    #[must_use]
    pub fn refreshed(&self, response: TokenResponse) -> Self {
        let previous_refresh = self.refresh_token.clone();
        let mut next = Self::from(response);
        if next.refresh_token.is_none() {
            next.refresh_token = previous_refresh;
        }
        next
    }

    /// Check if the token is expired (with 60 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_secs() + 60 >= expires_at,
            // No expiry = doesn't expire
            None => false,
        }
    }

    /// Time until expiration
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.and_then(|expires_at| {
            let now = now_secs();
            (expires_at > now).then(|| Duration::from_secs(expires_at - now))
        })
    }
}

/// Shorten a token for logs
pub fn mask_token(token: &str) -> String {
    let trimmed = token.trim();
    let len = trimmed.chars().count();
    if len <= MASK_PREFIX_LEN + MASK_SUFFIX_LEN {
        return "*".repeat(len.min(8));
    }

    let prefix: String = trimmed.chars().take(MASK_PREFIX_LEN).collect();
    let suffix: String = trimmed.chars().skip(len - MASK_SUFFIX_LEN).collect();
    format!("{prefix}...{suffix}")
}
