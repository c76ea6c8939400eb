//! Bank resource API accessors
//!
//! Corporate and personal account endpoints, called with the session's bearer
//! token and the static `web-api-key`. A rejected token is reported as
//! [`Fetched::ExpiredToken`] so the caller can refresh; every other failure
//! is an error.

mod resource;

pub use resource::{
    CorpAccountsQuery, CorpBalanceQuery, CorpTransHistoryQuery, PersAccountsQuery, Resource,
};

use reqwest::{Client, StatusCode, header};
use tracing::debug;
use url::Url;

use crate::config::{ApiConfig, HttpConfig};
use crate::{Error, Result};

/// Header carrying the bank gateway API key
pub const WEB_API_KEY_HEADER: &str = "web-api-key";

/// Outcome of a resource call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Raw response body of a successful call
    Body(String),
    /// Access token was rejected (401/403)
    ExpiredToken,
}

/// Client for the bank's account APIs
pub struct BankApi {
    http_client: Client,
    config: ApiConfig,
}

impl BankApi {
    /// Create a new bank API client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ApiConfig, http: &HttpConfig) -> Result<Self> {
        let http_client = http.client_builder().build()?;
        Ok(Self::with_client(http_client, config))
    }

    /// Create a bank API client around an existing reqwest client
    #[must_use]
    pub fn with_client(http_client: Client, config: ApiConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    /// Full URL (including query) for a resource
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configured base URL is invalid.
    pub fn url_for(&self, resource: &Resource) -> Result<Url> {
        let template = match resource {
            Resource::CorpAccounts(_) => &self.config.corp_accounts_url,
            Resource::CorpBalance(_) => &self.config.corp_balance_url,
            Resource::CorpTransHistory(_) => &self.config.corp_history_url,
            Resource::PersAccounts(_) => &self.config.pers_accounts_url,
        };
        resource.build_url(template)
    }

    /// Call a resource with the given access token
    ///
    /// # Errors
    ///
    /// - [`Error::Upstream`] for non-success statuses other than 401/403,
    ///   carrying the status and body unchanged
    /// - [`Error::Http`] for transport failures
    pub async fn fetch(&self, resource: &Resource, token: &str) -> Result<Fetched> {
        let url = self.url_for(resource)?;
        debug!(resource = resource.name(), url = %url, "Calling bank API");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .header(WEB_API_KEY_HEADER, &self.config.web_api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            debug!(resource = resource.name(), %status, "Access token rejected");
            return Ok(Fetched::ExpiredToken);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        debug!(resource = resource.name(), bytes = body.len(), "Bank API responded");
        Ok(Fetched::Body(body))
    }
}
