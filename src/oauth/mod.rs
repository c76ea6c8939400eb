//! OAuth 2.0 client for the bank's identity provider
//!
//! Features:
//! - Authorization URL construction with CSRF `state`
//! - Non-interactive code retrieval by following the authorization redirect
//! - Authorization code and refresh token grants
//! - In-memory token store with single-flight refresh

mod callback;
mod client;
mod store;
mod token;

pub use callback::{CallbackParams, CallbackResult};
pub use client::{OAuthClient, build_authorization_url, generate_state};
pub use store::{MAX_PENDING_STATES, STATE_TTL, TokenStore};
pub use token::{TokenInfo, TokenResponse, mask_token};
