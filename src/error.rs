//! Error types for the bank OAuth proxy

use std::io;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for the bank OAuth proxy
pub type Result<T> = std::result::Result<T, Error>;

/// Message returned when the user has to run the authorization flow again
pub const REAUTHORIZE_MESSAGE: &str = "Refresh token has expired. Client has to be authorized.";

/// Bank OAuth proxy errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Callback `state` was never issued, already used, or expired
    #[error("State not found - possible CSRF attempt")]
    StateNotFound,

    /// Required request parameter missing or empty
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Identity provider redirected back with an `error` parameter
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Authorization code could not be exchanged for tokens
    #[error("Code exchange failed: {0}")]
    ExchangeCodeForToken(String),

    /// Non-interactive code retrieval did not yield a code
    #[error("Failed to obtain authorization code: {0}")]
    GetCode(String),

    /// Access token rejected by the resource API
    #[error("Token has expired.")]
    ExpiredToken,

    /// Refresh token rejected by the identity provider
    #[error("Refresh token has expired. Client has to be authorized.")]
    ExpiredRefreshToken,

    /// No tokens have been obtained yet
    #[error("Client is not authorized. Visit /auth/authUrl to authorize.")]
    NotAuthorized,

    /// Access token was rejected again right after a refresh
    #[error("Access token was rejected after refresh.")]
    RefreshFailed,

    /// Token endpoint failed for a reason other than a rejected grant
    #[error("Token endpoint error: HTTP {status} - {body}")]
    TokenEndpoint {
        /// HTTP status returned by the token endpoint
        status: u16,
        /// Response body
        body: String,
    },

    /// Bank API answered with a non-success status
    #[error("Upstream error: HTTP {status}")]
    Upstream {
        /// HTTP status returned by the bank API
        status: u16,
        /// Response body, forwarded unchanged
        body: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status this error maps to when returned from a handler
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::StateNotFound | Self::MissingParameter(_) | Self::AuthorizationDenied(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ExpiredToken
            | Self::ExpiredRefreshToken
            | Self::NotAuthorized
            | Self::RefreshFailed => StatusCode::UNAUTHORIZED,
            Self::ExchangeCodeForToken(_)
            | Self::GetCode(_)
            | Self::TokenEndpoint { .. }
            | Self::Http(_) => StatusCode::BAD_GATEWAY,
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Config(_) | Self::Io(_) | Self::Json(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable code used in error bodies
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::StateNotFound => "state_not_found",
            Self::MissingParameter(_) => "missing_parameter",
            Self::AuthorizationDenied(_) => "authorization_denied",
            Self::ExchangeCodeForToken(_) => "code_exchange_failed",
            Self::GetCode(_) => "get_code_failed",
            Self::ExpiredToken => "expired_token",
            Self::ExpiredRefreshToken => "expired_refresh_token",
            Self::NotAuthorized => "not_authorized",
            Self::RefreshFailed => "refresh_failed",
            Self::TokenEndpoint { .. } => "token_endpoint_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Io(_) | Self::Json(_) | Self::Internal(_) => "internal_error",
            Self::Http(_) => "http_error",
        }
    }

    /// Value of the `WWW-Authenticate` header for 401 responses
    fn www_authenticate(&self) -> Option<&'static str> {
        match self {
            Self::RefreshFailed => Some("Bearer error=\"invalid_token\""),
            Self::ExpiredToken | Self::ExpiredRefreshToken | Self::NotAuthorized => Some("Bearer"),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Bank API failures are forwarded as-is
        if let Self::Upstream { body, .. } = self {
            return (status, body).into_response();
        }

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let www_authenticate = self.www_authenticate();
        let mut response = (
            status,
            Json(json!({
                "error": self.code(),
                "message": self.to_string(),
            })),
        )
            .into_response();

        if let Some(value) = www_authenticate {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(value));
        }
        response
    }
}
