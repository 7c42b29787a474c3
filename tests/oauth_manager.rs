//! End-to-end tests for the OAuth session manager against a mock
//! authorization server.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use walletgate::auth::{AuthStatusFacade, OAuthSessionManager};
use walletgate::{
    AuthConfig, AuthError, AuthenticationStatus, Error, MemoryTokenStorage, TokenResponse,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(server_uri: &str) -> AuthConfig {
    init_tracing();
    AuthConfig::builder()
        .client_id("abc")
        .redirect_uri("http://localhost:3000")
        .token_endpoint(format!("{server_uri}/oauth2/token"))
        .user_info_endpoint(format!("{server_uri}/userinfo"))
        .revocation_endpoint(format!("{server_uri}/oauth2/revoke"))
        .build()
}

fn manager(server_uri: &str) -> OAuthSessionManager<MemoryTokenStorage> {
    OAuthSessionManager::new(config(server_uri), MemoryTokenStorage::new())
}

/// Pull the `state` query parameter out of an authorization URL.
fn state_from(auth_url: &str) -> String {
    url::Url::parse(auth_url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

fn valid_token(access_token: &str) -> TokenResponse {
    TokenResponse {
        access_token: access_token.to_string(),
        token_type: "bearer".to_string(),
        expires_at: Utc::now() + Duration::hours(1),
        refresh_token: Some("refresh1".to_string()),
        id_token: None,
        scope: Some("openid offline".to_string()),
    }
}

#[tokio::test]
async fn test_redirect_sign_in_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=foo"))
        .and(body_string_contains("client_id=abc"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok1",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "user-123"})))
        .mount(&server)
        .await;

    let manager = manager(&server.uri());
    let auth_url = manager.sign_in_redirect().unwrap();
    let state = state_from(&auth_url);

    let user = manager
        .redirect_callback(&format!("http://localhost:3000/?code=foo&state={state}"))
        .await
        .unwrap();

    assert_eq!(user.access_token, "tok1");
    assert_eq!(user.id, "user-123");
    assert_eq!(manager.current_token().unwrap().access_token, "tok1");
}

#[tokio::test]
async fn test_state_mismatch_stores_no_token() {
    let server = MockServer::start().await;

    // The code must never reach the token endpoint.
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok1"})))
        .expect(0)
        .mount(&server)
        .await;

    let manager = manager(&server.uri());
    manager.sign_in_redirect().unwrap();

    let result = manager
        .redirect_callback("http://localhost:3000/?code=foo&state=forged")
        .await;

    assert!(matches!(result, Err(Error::Auth(AuthError::StateMismatch))));
    assert!(manager.current_token().is_none());
}

#[tokio::test]
async fn test_error_shapes_normalize_to_same_message() {
    for error_body in [
        json!({"error": {"message": "womp womp"}}),
        json!({"error": "womp womp"}),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(500).set_body_json(error_body))
            .mount(&server)
            .await;

        let manager = manager(&server.uri());
        let auth_url = manager.sign_in_redirect().unwrap();
        let state = state_from(&auth_url);

        let result = manager
            .redirect_callback(&format!("http://localhost:3000/?code=foo&state={state}"))
            .await;

        match result {
            Err(Error::Auth(AuthError::ServerError(message))) => {
                assert_eq!(message, "womp womp");
            }
            other => panic!("expected server error, got {other:?}"),
        }
        assert!(manager.current_token().is_none());
    }
}

#[tokio::test]
async fn test_refresh_returns_new_token_and_updates_cache() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "refreshed-token",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager(&server.uri());
    let token = manager.refresh_access_token("refresh1").await.unwrap();

    assert_eq!(token.access_token, "refreshed-token");
    // A rotation response without a refresh token keeps the old one.
    assert_eq!(token.refresh_token.as_deref(), Some("refresh1"));
    assert_eq!(
        manager.current_token().unwrap().access_token,
        "refreshed-token"
    );
}

#[tokio::test]
async fn test_invalid_grant_surfaces_as_dedicated_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;

    let manager = manager(&server.uri());
    let result = manager.refresh_access_token("expired-refresh").await;

    assert!(matches!(result, Err(Error::Auth(AuthError::InvalidGrant))));
    assert!(manager.current_token().is_none());
}

#[tokio::test]
async fn test_sign_out_revokes_and_clears() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/revoke"))
        .and(body_string_contains("token=tok1"))
        .and(body_string_contains("client_id=abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let storage = MemoryTokenStorage::new();
    use walletgate::TokenStorage;
    storage.save(&valid_token("tok1")).await.unwrap();

    let manager = Arc::new(OAuthSessionManager::new(config(&server.uri()), storage));
    manager.restore_session().await.unwrap();
    let facade = AuthStatusFacade::new(Arc::clone(&manager));
    assert_eq!(facade.auth_status(), AuthenticationStatus::Connected);

    facade.sign_out().await.unwrap();

    assert_eq!(facade.auth_status(), AuthenticationStatus::NotConnected);
    assert!(manager.current_token().is_none());
}

#[tokio::test]
async fn test_revocation_accepts_empty_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/revoke"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let manager = manager(&server.uri());
    let response = manager.request_sign_out("already-revoked").await.unwrap();
    assert!(response.as_object().is_some_and(|o| o.is_empty()));
}

#[tokio::test]
async fn test_user_info_returns_claims() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"sub": "user-123", "email": "a@b.c"})),
        )
        .mount(&server)
        .await;

    let manager = manager(&server.uri());
    let claims = manager.request_user_info("tok1").await.unwrap();
    assert_eq!(claims["sub"], "user-123");
}

#[tokio::test]
async fn test_connect_is_idempotent_without_network_calls() {
    let server = MockServer::start().await;

    // Any request to the mock server would 404; the expectation below
    // proves connect() stays local with a valid token.
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let storage = MemoryTokenStorage::new();
    use walletgate::TokenStorage;
    storage.save(&valid_token("tok1")).await.unwrap();

    let manager = Arc::new(OAuthSessionManager::new(config(&server.uri()), storage));
    manager.restore_session().await.unwrap();
    let facade = AuthStatusFacade::new(manager);

    let first = facade.connect().await.unwrap();
    let second = facade.connect().await.unwrap();
    assert_eq!(first.access_token, "tok1");
    assert_eq!(second.access_token, "tok1");
}

#[tokio::test]
async fn test_get_user_fetches_claims_after_local_connect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "user-123"})))
        .expect(1)
        .mount(&server)
        .await;

    let storage = MemoryTokenStorage::new();
    use walletgate::TokenStorage;
    storage.save(&valid_token("tok1")).await.unwrap();

    let manager = Arc::new(OAuthSessionManager::new(config(&server.uri()), storage));
    manager.restore_session().await.unwrap();
    let facade = AuthStatusFacade::new(manager);

    // connect() on a restored session knows the token but not the claims.
    let connected = facade.connect().await.unwrap();
    assert_eq!(connected.id, "");

    let user = facade.get_user().await.unwrap();
    assert_eq!(user.id, "user-123");
    assert_eq!(user.access_token, "tok1");

    // The claims are cached now; a second call stays local (expect(1)).
    let again = facade.get_user().await.unwrap();
    assert_eq!(again.id, "user-123");
}

#[tokio::test]
async fn test_expired_token_connect_refreshes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "refreshed-token",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = MemoryTokenStorage::new();
    use walletgate::TokenStorage;
    let expired = TokenResponse {
        expires_at: Utc::now() - Duration::hours(1),
        ..valid_token("stale")
    };
    storage.save(&expired).await.unwrap();

    let manager = Arc::new(OAuthSessionManager::new(config(&server.uri()), storage));
    manager.restore_session().await.unwrap();
    let facade = AuthStatusFacade::new(manager);
    assert_eq!(facade.auth_status(), AuthenticationStatus::Expired);

    let user = facade.connect().await.unwrap();
    assert_eq!(user.access_token, "refreshed-token");
    assert_eq!(facade.auth_status(), AuthenticationStatus::Connected);
}
