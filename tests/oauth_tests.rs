//! Authorization flow tests against a mock identity provider

mod common;

use axum::http::{StatusCode, header};
use bank_oauth_proxy::Error;
use bank_oauth_proxy::gateway::{CALLBACK_SUCCESS_MESSAGE, SessionState};
use bank_oauth_proxy::oauth::{TokenInfo, TokenResponse};
use common::{
    AUTH_PATH, CALLBACK_URL, CLIENT_ID, CORP_ACCOUNTS_PATH, TOKEN_PATH, TestApp, body_string,
    oauth_client, token_json,
};
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Issue an authorization URL through the router and return its `state`
async fn issue_state(app: &TestApp) -> String {
    let response = app.get("/auth/authUrl").await;
    assert_eq!(response.status(), StatusCode::OK);
    let url = Url::parse(&body_string(response).await).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

// =============================================================================
// Code exchange
// =============================================================================

#[tokio::test]
async fn exchange_code_returns_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=valid-code"))
        .and(body_string_contains(format!("client_id={CLIENT_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("at-1", Some("rt-1"))))
        .expect(1)
        .mount(&server)
        .await;

    let client = oauth_client(&server, false);
    let tokens = client.exchange_code("valid-code").await.unwrap();

    assert_eq!(tokens.access_token, "at-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(tokens.expires_in, Some(300));
}

#[tokio::test]
async fn exchange_code_rejected_by_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&server)
        .await;

    let err = oauth_client(&server, false)
        .exchange_code("used-code")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExchangeCodeForToken(_)));
}

#[tokio::test]
async fn exchange_code_rejects_non_token_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = oauth_client(&server, false)
        .exchange_code("code")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExchangeCodeForToken(_)));
}

#[tokio::test]
async fn refresh_rejection_means_expired_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&server)
        .await;

    let err = oauth_client(&server, false)
        .refresh_access_token("rt-old")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExpiredRefreshToken));
}

#[tokio::test]
async fn refresh_server_error_is_not_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = oauth_client(&server, false)
        .refresh_access_token("rt")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenEndpoint { status: 503, .. }));
}

#[tokio::test]
async fn refresh_without_access_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("", Some("rt-2"))))
        .mount(&server)
        .await;

    let err = oauth_client(&server, false)
        .refresh_access_token("rt")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenEndpoint { status: 200, .. }));
}

// =============================================================================
// Interactive flow through the router
// =============================================================================

#[tokio::test]
async fn auth_url_points_at_identity_provider() {
    let server = MockServer::start().await;
    let app = TestApp::new(&server, false);

    let response = app.get("/auth/authUrl").await;
    assert_eq!(response.status(), StatusCode::OK);
    let url = Url::parse(&body_string(response).await).unwrap();

    assert_eq!(url.path(), AUTH_PATH);
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let value = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };
    assert_eq!(value("client_id"), Some(CLIENT_ID));
    assert_eq!(value("redirect_uri"), Some(CALLBACK_URL));
    assert_eq!(value("response_type"), Some("code"));
    assert_eq!(value("access_type"), Some("offline"));
    assert!(value("state").is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn callback_exchanges_code_and_stores_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("code=cb-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("at-cb", Some("rt-cb"))))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::new(&server, false);
    assert_eq!(app.state.handler.state(), SessionState::Unauthenticated);

    let state = issue_state(&app).await;
    let response = app
        .get(&format!("/auth/callback?code=cb-code&state={state}"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, CALLBACK_SUCCESS_MESSAGE);
    assert_eq!(app.state.handler.state(), SessionState::Authenticated);
    assert_eq!(app.store().access_token().as_deref(), Some("at-cb"));
    assert_eq!(app.store().refresh_token().as_deref(), Some("rt-cb"));
}

#[tokio::test]
async fn callback_state_is_single_use() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("at", Some("rt"))))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::new(&server, false);
    let state = issue_state(&app).await;
    let uri = format!("/auth/callback?code=c&state={state}");

    assert_eq!(app.get(&uri).await.status(), StatusCode::OK);
    assert_eq!(app.get(&uri).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_with_unknown_state_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("at", None)))
        .expect(0)
        .mount(&server)
        .await;

    let app = TestApp::new(&server, false);
    let response = app.get("/auth/callback?code=c&state=forged").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "state_not_found");
    assert!(!app.store().is_authenticated());
}

#[tokio::test]
async fn callback_without_code_is_bad_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("at", None)))
        .expect(0)
        .mount(&server)
        .await;

    let app = TestApp::new(&server, false);
    let state = issue_state(&app).await;

    let response = app.get(&format!("/auth/callback?state={state}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "missing_parameter");
}

#[tokio::test]
async fn callback_with_provider_error_is_denied() {
    let server = MockServer::start().await;
    let app = TestApp::new(&server, false);

    let response = app
        .get("/auth/callback?error=access_denied&error_description=User+cancelled")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "authorization_denied");
}

#[tokio::test]
async fn failed_exchange_keeps_previous_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::new(&server, false).with_tokens("at-old", Some("rt-old"));
    let state = issue_state(&app).await;

    let response = app
        .get(&format!("/auth/callback?code=stale&state={state}"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"], "code_exchange_failed");

    let tokens: TokenInfo = app.store().tokens().unwrap();
    assert_eq!(tokens.access_token, "at-old");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-old"));
}

#[tokio::test]
async fn health_reports_session_state() {
    let server = MockServer::start().await;
    let app = TestApp::new(&server, false);

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["authenticated"], false);
    assert!(body["access_token_expires_in"].is_null());
    assert_eq!(body["access_token_expired"], false);

    let app = app.with_tokens("at", Some("rt"));
    let body: serde_json::Value =
        serde_json::from_str(&body_string(app.get("/health").await).await).unwrap();
    assert_eq!(body["authenticated"], true);
    assert!(body["access_token_expires_in"].as_u64().is_some());
    assert_eq!(body["access_token_expired"], false);
}

#[tokio::test]
async fn health_flags_token_close_to_expiry() {
    let server = MockServer::start().await;
    let app = TestApp::new(&server, false);
    app.store().set(TokenInfo::from(TokenResponse {
        access_token: "at-short".to_string(),
        token_type: None,
        expires_in: Some(10),
        refresh_token: None,
        scope: None,
    }));

    let body: serde_json::Value =
        serde_json::from_str(&body_string(app.get("/health").await).await).unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["access_token_expired"], true);
}

// =============================================================================
// Non-interactive flow
// =============================================================================

/// Identity provider that immediately redirects back with a code, echoing `state`
fn redirect_with_code(request: &Request) -> ResponseTemplate {
    let state = request
        .url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();
    let mut location = Url::parse(CALLBACK_URL).unwrap();
    location
        .query_pairs_mut()
        .append_pair("code", "auto-code")
        .append_pair("state", &state);
    ResponseTemplate::new(302).insert_header(header::LOCATION.as_str(), location.as_str())
}

#[tokio::test]
async fn get_code_reads_redirect_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .respond_with(redirect_with_code)
        .expect(1)
        .mount(&server)
        .await;

    let code = oauth_client(&server, true).get_code("s-123").await.unwrap();
    assert_eq!(code, "auto-code");
}

#[tokio::test]
async fn get_code_requires_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form>login</form>"))
        .mount(&server)
        .await;

    let err = oauth_client(&server, true).get_code("s").await.unwrap_err();
    assert!(matches!(err, Error::GetCode(_)));
}

#[tokio::test]
async fn auto_authorize_obtains_tokens_before_first_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .respond_with(redirect_with_code)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("code=auto-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("at-auto", Some("rt"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CORP_ACCOUNTS_PATH))
        .and(wiremock::matchers::header("authorization", "Bearer at-auto"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"accounts":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::new(&server, true);
    let response = app.get("/corpaccounts").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, r#"{"accounts":[]}"#);
    assert_eq!(app.store().access_token().as_deref(), Some("at-auto"));
}
