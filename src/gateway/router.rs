//! HTTP router and handlers

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info};

use super::handler::{RequestHandler, SessionState};
use crate::Result;
use crate::bank::{
    CorpAccountsQuery, CorpBalanceQuery, CorpTransHistoryQuery, PersAccountsQuery, Resource,
};
use crate::oauth::{CallbackParams, TokenInfo};

/// Message returned after a successful callback
pub const CALLBACK_SUCCESS_MESSAGE: &str =
    "Code has been changed for tokens. Application is now ready to serve API calls.";

/// Shared application state
pub struct AppState {
    /// Token lifecycle and retry orchestration
    pub handler: RequestHandler,
}

/// Create the router
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/authUrl", get(auth_url_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/corpaccounts", get(corp_accounts_handler))
        .route("/corpaccbalance", get(corp_balance_handler))
        .route("/corptranshist", get(corp_trans_history_handler))
        .route("/persaccounts", get(pers_accounts_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let authenticated = state.handler.state() == SessionState::Authenticated;
    let tokens = state.handler.store().tokens();
    let expires_in = tokens
        .as_ref()
        .and_then(TokenInfo::time_until_expiry)
        .map(|d| d.as_secs());
    // Expired tokens are still tried once; the bank decides and a refresh follows
    let expired = tokens.as_ref().is_some_and(TokenInfo::is_expired);

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "authenticated": authenticated,
        "access_token_expires_in": expires_in,
        "access_token_expired": expired,
    }))
}

/// GET /auth/authUrl - URL the user opens to authorize this client
async fn auth_url_handler(State(state): State<Arc<AppState>>) -> Result<String> {
    let url = state.handler.begin_authorization()?;
    debug!(url = %url, "Built authorization URL");
    Ok(url)
}

/// GET /auth/callback - identity provider redirects here with `code` and `state`
async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<&'static str> {
    let callback = params.into_result()?;
    state
        .handler
        .complete_authorization(&callback.code, &callback.state)
        .await?;
    info!("Authorization completed");
    Ok(CALLBACK_SUCCESS_MESSAGE)
}

/// GET /corpaccounts
async fn corp_accounts_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CorpAccountsQuery>,
) -> Result<Response> {
    proxy(&state, Resource::CorpAccounts(query)).await
}

/// GET /corpaccbalance
async fn corp_balance_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CorpBalanceQuery>,
) -> Result<Response> {
    proxy(&state, Resource::CorpBalance(query)).await
}

/// GET /corptranshist
async fn corp_trans_history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CorpTransHistoryQuery>,
) -> Result<Response> {
    proxy(&state, Resource::CorpTransHistory(query)).await
}

/// GET /persaccounts
async fn pers_accounts_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PersAccountsQuery>,
) -> Result<Response> {
    proxy(&state, Resource::PersAccounts(query)).await
}

/// Run a resource call through the handler and return the bank's body as-is
async fn proxy(state: &AppState, resource: Resource) -> Result<Response> {
    let body = state.handler.call(&resource).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}
