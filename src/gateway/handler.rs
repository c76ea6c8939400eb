//! Refresh-and-retry orchestration around bank API calls
//!
//! Each call runs this state machine:
//!
//! 1. `Unauthenticated`: obtain tokens (non-interactively if enabled,
//!    otherwise fail with [`Error::NotAuthorized`]).
//! 2. `Authenticated`: call the resource.
//! 3. Token rejected: refresh once, then call the resource once more.
//! 4. Rejected again: [`Error::RefreshFailed`].
//!
//! A request makes at most two resource calls and one refresh.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bank::{BankApi, Fetched, Resource};
use crate::oauth::{OAuthClient, TokenInfo, TokenStore, generate_state, mask_token};
use crate::{Error, Result};

/// Session state as seen by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No access token held
    Unauthenticated,
    /// An access token is held
    Authenticated,
}

/// Orchestrates token acquisition, resource calls and refresh
pub struct RequestHandler {
    oauth: Arc<OAuthClient>,
    bank: Arc<BankApi>,
    store: Arc<TokenStore>,
    auto_authorize: bool,
}

impl RequestHandler {
    /// Create a new handler
    #[must_use]
    pub fn new(oauth: Arc<OAuthClient>, bank: Arc<BankApi>, store: Arc<TokenStore>) -> Self {
        let auto_authorize = oauth.config().auto_authorize;
        Self {
            oauth,
            bank,
            store,
            auto_authorize,
        }
    }

    /// Token store used by this handler
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        if self.store.is_authenticated() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Complete an interactive authorization: check `state`, exchange `code`.
    ///
    /// Stored tokens are only replaced when the exchange succeeds.
    ///
    /// # Errors
    ///
    /// - [`Error::StateNotFound`] if `state` was not issued by us
    /// - [`Error::ExchangeCodeForToken`] if the token endpoint rejects the code
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<()> {
        if !self.store.take_state(state) {
            warn!("Callback with unknown state");
            return Err(Error::StateNotFound);
        }

        // Token writes are serialized with refreshes
        let _guard = self.store.refresh_gate().lock().await;
        let tokens = self.oauth.exchange_code(code).await?;
        self.store.set(TokenInfo::from(tokens));
        Ok(())
    }

    /// Issue a fresh `state` and return the authorization URL carrying it
    ///
    /// # Errors
    ///
    /// Returns an error if the authorization endpoint is misconfigured.
    pub fn begin_authorization(&self) -> Result<String> {
        let state = generate_state();
        let url = self.oauth.authorization_url(&state)?;
        self.store.issue_state(&state);
        Ok(url.to_string())
    }

    /// Call a bank resource, refreshing the access token once if it is rejected.
    ///
    /// Returns the raw response body.
    ///
    /// # Errors
    ///
    /// - [`Error::NotAuthorized`] when no tokens are held and auto-authorization is off
    /// - [`Error::ExpiredRefreshToken`] when the refresh token is rejected
    /// - [`Error::RefreshFailed`] when the refreshed token is rejected too
    /// - [`Error::Upstream`] / [`Error::Http`] from the bank API, unchanged
    pub async fn call(&self, resource: &Resource) -> Result<String> {
        let token = self.ensure_access_token().await?;

        match self.bank.fetch(resource, &token).await? {
            Fetched::Body(body) => return Ok(body),
            Fetched::ExpiredToken => {
                debug!(resource = resource.name(), "Access token rejected, refreshing");
            }
        }

        let token = self.refresh(&token).await?;

        match self.bank.fetch(resource, &token).await? {
            Fetched::Body(body) => Ok(body),
            Fetched::ExpiredToken => {
                warn!(resource = resource.name(), "Refreshed access token rejected");
                Err(Error::RefreshFailed)
            }
        }
    }

    /// Current access token, authorizing first if there is none
    async fn ensure_access_token(&self) -> Result<String> {
        if let Some(token) = self.store.access_token() {
            return Ok(token);
        }

        if !self.auto_authorize {
            return Err(Error::NotAuthorized);
        }

        // Serialize with refreshes so parallel first requests authorize once
        let _guard = self.store.refresh_gate().lock().await;
        if let Some(token) = self.store.access_token() {
            return Ok(token);
        }

        info!("No tokens held, authorizing via redirect");
        let state = generate_state();
        let code = self.oauth.get_code(&state).await?;
        let tokens = self.oauth.exchange_code(&code).await?;
        let info = TokenInfo::from(tokens);
        let access = info.access_token.clone();
        self.store.set(info);
        Ok(access)
    }

    /// Single-flight refresh of a rejected access token.
    ///
    /// If another request refreshed while we waited for the gate, its token
    /// is returned without contacting the identity provider.
    async fn refresh(&self, rejected: &str) -> Result<String> {
        let _guard = self.store.refresh_gate().lock().await;

        let Some(current) = self.store.tokens() else {
            // Cleared by a concurrent failed refresh
            return Err(Error::ExpiredRefreshToken);
        };
        if current.access_token != rejected {
            debug!(
                access_token = %mask_token(&current.access_token),
                "Access token already refreshed by another request"
            );
            return Ok(current.access_token);
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            info!("No refresh token held, authorization required");
            self.store.clear_if_current(rejected);
            return Err(Error::ExpiredRefreshToken);
        };

        match self.oauth.refresh_access_token(refresh_token).await {
            Ok(response) => {
                let next = current.refreshed(response);
                let access = next.access_token.clone();
                if self.store.replace_if_current(rejected, next) {
                    Ok(access)
                } else {
                    self.replaced_session()
                }
            }
            Err(Error::ExpiredRefreshToken) => {
                if self.store.clear_if_current(rejected) {
                    info!("Refresh token has expired. Client has to be authorized.");
                    Err(Error::ExpiredRefreshToken)
                } else {
                    self.replaced_session()
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Token of a session stored while a refresh for an older one was running
    fn replaced_session(&self) -> Result<String> {
        debug!("Tokens replaced during refresh, keeping the new session");
        self.store.access_token().ok_or(Error::ExpiredRefreshToken)
    }
}
