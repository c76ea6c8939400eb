//! Bank OAuth Proxy Library
//!
//! Demo web service that signs in to a bank's OAuth2 identity provider and
//! proxies calls to its corporate and personal account APIs.
//!
//! # Features
//!
//! - **Authorization code flow**: authorization URL with CSRF state, callback
//!   endpoint, optional non-interactive code retrieval
//! - **One-shot refresh**: a rejected access token is refreshed once and the
//!   call retried once; an expired refresh token asks for re-authorization
//! - **Single-flight refresh**: concurrent requests share one refresh
//! - **Pass-through**: bank responses are returned unchanged

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bank;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod oauth;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level`.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| Error::Internal(format!("Failed to initialize tracing: {e}")))
}
