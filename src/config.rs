//! Configuration management

use std::{env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "BANK_PROXY_";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Identity provider configuration
    pub oauth: OAuthConfig,
    /// Bank API configuration
    pub api: ApiConfig,
    /// Outbound HTTP client configuration
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Timeout for a whole inbound request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// OAuth2 client registration at the bank's identity provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Client ID
    pub client_id: String,
    /// Client secret (supports `${VAR}`)
    pub client_secret: String,
    /// Redirect URI sent with the token request
    pub redirect_uri: String,
    /// Redirect URI placed into the authorization URL (our `/auth/callback`)
    pub authorization_redirect_uri: String,
    /// Authorization endpoint issuing codes via redirect
    pub authorization_endpoint: String,
    /// Token endpoint
    pub token_endpoint: String,
    /// Optional scope requested during authorization
    pub scope: Option<String>,
    /// Obtain a code by following the authorization redirect without a browser
    pub auto_authorize: bool,
}

/// Bank resource API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Static gateway key sent as `web-api-key` (supports `${VAR}`)
    pub web_api_key: String,
    /// Corporate accounts list
    pub corp_accounts_url: String,
    /// Corporate account balance, `{id}` is replaced by the account id
    pub corp_balance_url: String,
    /// Corporate transaction history, `{id}` is replaced by the account id
    pub corp_history_url: String,
    /// Personal accounts list
    pub pers_accounts_url: String,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout for identity provider and bank API calls
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpConfig {
    /// Build a reqwest client honoring these timeouts
    pub fn client_builder(&self) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("bank-oauth-proxy/", env!("CARGO_PKG_VERSION")))
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // BANK_PROXY_OAUTH__CLIENT_ID -> oauth.client_id
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.expand_env_vars();

        Ok(config)
    }

    /// Check that everything needed to talk to the bank is present
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first missing or malformed field.
    pub fn validate(&self) -> Result<()> {
        if self.oauth.client_id.is_empty() {
            return Err(Error::Config("oauth.client_id is required".to_string()));
        }

        let urls = [
            ("oauth.authorization_endpoint", &self.oauth.authorization_endpoint),
            ("oauth.token_endpoint", &self.oauth.token_endpoint),
            ("oauth.authorization_redirect_uri", &self.oauth.authorization_redirect_uri),
            ("api.corp_accounts_url", &self.api.corp_accounts_url),
            ("api.corp_balance_url", &self.api.corp_balance_url),
            ("api.corp_history_url", &self.api.corp_history_url),
            ("api.pers_accounts_url", &self.api.pers_accounts_url),
        ];
        for (name, value) in urls {
            Url::parse(value)
                .map_err(|e| Error::Config(format!("{name} is not a valid URL ({value:?}): {e}")))?;
        }

        Ok(())
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in credential and URL fields
    fn expand_env_vars(&mut self) {
        let Ok(re) = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
            return;
        };

        let fields = [
            &mut self.oauth.client_id,
            &mut self.oauth.client_secret,
            &mut self.oauth.redirect_uri,
            &mut self.oauth.authorization_redirect_uri,
            &mut self.oauth.authorization_endpoint,
            &mut self.oauth.token_endpoint,
            &mut self.api.web_api_key,
            &mut self.api.corp_accounts_url,
            &mut self.api.corp_balance_url,
            &mut self.api.corp_history_url,
            &mut self.api.pers_accounts_url,
        ];
        for field in fields {
            *field = Self::expand_string(&re, field);
        }
    }

    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures<'_>| {
            let var = &caps[1];
            env::var(var).unwrap_or_else(|_| {
                caps.get(2)
                    .map_or_else(String::new, |m| m.as_str().to_string())
            })
        })
        .into_owned()
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        // "ms" must be checked before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
