//! OAuth Client
//!
//! Talks to the bank's identity provider: builds authorization URLs, follows
//! the authorization redirect for non-interactive logins, and calls the token
//! endpoint for the `authorization_code` and `refresh_token` grants.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::{Client, header, redirect::Policy};
use tracing::{debug, info, warn};
use url::Url;

use super::token::{TokenResponse, mask_token};
use crate::config::{HttpConfig, OAuthConfig};
use crate::{Error, Result};

/// OAuth client for the bank's identity provider
pub struct OAuthClient {
    /// HTTP client for identity provider requests (redirects disabled)
    http_client: Client,

    /// Client registration and endpoints
    config: OAuthConfig,
}

impl OAuthClient {
    /// Create a new OAuth client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OAuthConfig, http: &HttpConfig) -> Result<Self> {
        // get_code needs to see the 3xx itself
        let http_client = http.client_builder().redirect(Policy::none()).build()?;
        Ok(Self::with_client(http_client, config))
    }

    /// Create a client around an existing reqwest client.
    ///
    /// The client must not follow redirects for [`Self::get_code`] to work.
    #[must_use]
    pub fn with_client(http_client: Client, config: OAuthConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Client configuration
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the URL the user is sent to for authorization.
    ///
    /// Pure string construction: the same `state` always yields the same URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization endpoint is not a URL.
    pub fn authorization_url(&self, state: &str) -> Result<Url> {
        build_authorization_url(
            &self.config.authorization_endpoint,
            &self.config.authorization_redirect_uri,
            &self.config.client_id,
            state,
            self.config.scope.as_deref(),
        )
    }

    /// Obtain an authorization code without a browser.
    ///
    /// Requests the authorization URL and reads `code` from the `Location`
    /// header of the redirect the identity provider answers with.
    ///
    /// # Errors
    ///
    /// - [`Error::GetCode`] when there is no redirect or no `code` in it
    /// - [`Error::StateNotFound`] when the redirect echoes a different `state`
    /// - [`Error::AuthorizationDenied`] when the redirect carries `error`
    pub async fn get_code(&self, state: &str) -> Result<String> {
        let url = self.authorization_url(state)?;
        debug!(endpoint = %self.config.authorization_endpoint, "Requesting authorization code");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();

        if !status.is_redirection() {
            return Err(Error::GetCode(format!(
                "expected a redirect from the authorization endpoint, got HTTP {status}"
            )));
        }

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::GetCode("redirect without Location header".to_string()))?;

        code_from_location(location, state)
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExchangeCodeForToken`] if the token endpoint rejects
    /// the code or answers with something that is not a token.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::ExchangeCodeForToken(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Code exchange rejected");
            return Err(Error::ExchangeCodeForToken(format!("HTTP {status} - {body}")));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            Error::ExchangeCodeForToken(format!("failed to parse token response: {e}"))
        })?;

        if token.access_token.is_empty() {
            return Err(Error::ExchangeCodeForToken(
                "token response has an empty access_token".to_string(),
            ));
        }

        info!(access_token = %mask_token(&token.access_token), "Exchanged code for tokens");
        Ok(token)
    }

    /// Mint a new access token from a refresh token
    ///
    /// # Errors
    ///
    /// - [`Error::ExpiredRefreshToken`] when the provider rejects the refresh
    ///   token (any 4xx); the user has to authorize again
    /// - [`Error::TokenEndpoint`] for other non-success statuses and for a
    ///   response without an access token
    /// - [`Error::Http`] for transport failures
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        debug!(refresh_token = %mask_token(refresh_token), "Refreshing access token");

        let response = self
            .http_client
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            info!(%status, body = %body, "Refresh token rejected");
            return Err(Error::ExpiredRefreshToken);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        if token.access_token.is_empty() {
            return Err(Error::TokenEndpoint {
                status: status.as_u16(),
                body: "token response has an empty access_token".to_string(),
            });
        }

        info!(access_token = %mask_token(&token.access_token), "Token refreshed successfully");
        Ok(token)
    }
}

/// Build an authorization URL from its parts
///
/// # Errors
///
/// Returns [`Error::Config`] if `endpoint` is not a valid URL.
pub fn build_authorization_url(
    endpoint: &str,
    redirect_uri: &str,
    client_id: &str,
    state: &str,
    scope: Option<&str>,
) -> Result<Url> {
    let mut url = Url::parse(endpoint)
        .map_err(|e| Error::Config(format!("Invalid authorization endpoint: {e}")))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("redirect_uri", redirect_uri);
        params.append_pair("client_id", client_id);
        params.append_pair("response_type", "code");
        params.append_pair("access_type", "offline");
        params.append_pair("state", state);
        if let Some(scope) = scope {
            params.append_pair("scope", scope);
        }
    }

    Ok(url)
}

/// Pull the authorization code out of a redirect `Location`
fn code_from_location(location: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(location)
        .map_err(|e| Error::GetCode(format!("invalid redirect location {location:?}: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(Error::AuthorizationDenied(error));
    }
    if state.is_some_and(|s| s != expected_state) {
        return Err(Error::StateNotFound);
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| Error::GetCode("redirect location has no code parameter".to_string()))
}

/// Generate a random state parameter
pub fn generate_state() -> String {
    let state_bytes: [u8; 16] = rand::random();
    URL_SAFE_NO_PAD.encode(state_bytes)
}
