//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use bank_oauth_proxy::bank::BankApi;
use bank_oauth_proxy::config::{ApiConfig, OAuthConfig};
use bank_oauth_proxy::gateway::{AppState, RequestHandler, create_router};
use bank_oauth_proxy::oauth::{OAuthClient, TokenInfo, TokenResponse, TokenStore};
use reqwest::redirect::Policy;
use tower::ServiceExt;
use wiremock::MockServer;

pub const CLIENT_ID: &str = "test_client_id";
pub const CLIENT_SECRET: &str = "test_client_secret";
pub const WEB_API_KEY: &str = "test-web-api-key";
pub const CALLBACK_URL: &str = "http://localhost:8080/auth/callback";

pub const AUTH_PATH: &str = "/auth";
pub const TOKEN_PATH: &str = "/token";
pub const CORP_ACCOUNTS_PATH: &str = "/corporate/our/accounts";
pub const PERS_ACCOUNTS_PATH: &str = "/netbanking/my/accounts";

pub fn oauth_config(server: &MockServer, auto_authorize: bool) -> OAuthConfig {
    OAuthConfig {
        client_id: CLIENT_ID.to_string(),
        client_secret: CLIENT_SECRET.to_string(),
        redirect_uri: CALLBACK_URL.to_string(),
        authorization_redirect_uri: CALLBACK_URL.to_string(),
        authorization_endpoint: format!("{}{AUTH_PATH}", server.uri()),
        token_endpoint: format!("{}{TOKEN_PATH}", server.uri()),
        scope: None,
        auto_authorize,
    }
}

pub fn api_config(server: &MockServer) -> ApiConfig {
    let base = server.uri();
    ApiConfig {
        web_api_key: WEB_API_KEY.to_string(),
        corp_accounts_url: format!("{base}{CORP_ACCOUNTS_PATH}"),
        corp_balance_url: format!("{base}{CORP_ACCOUNTS_PATH}/{{id}}/balance"),
        corp_history_url: format!("{base}{CORP_ACCOUNTS_PATH}/{{id}}/transactions"),
        pers_accounts_url: format!("{base}{PERS_ACCOUNTS_PATH}"),
    }
}

pub fn oauth_client(server: &MockServer, auto_authorize: bool) -> OAuthClient {
    let http = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();
    OAuthClient::with_client(http, oauth_config(server, auto_authorize))
}

/// Handler state wired to a mock identity provider and bank
pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    pub fn new(server: &MockServer, auto_authorize: bool) -> Self {
        let oauth = Arc::new(oauth_client(server, auto_authorize));
        let bank = Arc::new(BankApi::with_client(
            reqwest::Client::new(),
            api_config(server),
        ));
        let store = Arc::new(TokenStore::new());
        let state = Arc::new(AppState {
            handler: RequestHandler::new(oauth, bank, store),
        });
        let router = create_router(Arc::clone(&state), Duration::from_secs(10));
        Self { state, router }
    }

    pub fn store(&self) -> &TokenStore {
        self.state.handler.store()
    }

    pub fn with_tokens(self, access: &str, refresh: Option<&str>) -> Self {
        self.store().set(TokenInfo::from(TokenResponse {
            access_token: access.to_string(),
            token_type: Some("bearer".to_string()),
            expires_in: Some(300),
            refresh_token: refresh.map(str::to_string),
            scope: None,
        }));
        self
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn token_json(access: &str, refresh: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 300,
        "scope": "AISP",
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    body
}
