//! Integration tests for the refresh grant transport against a mock server.

use serde_json::json;
use session_lifecycle::{
    http_renewal_config, ClientAuthMethod, FileBackend, HttpRenewalTransport, PersistenceBackend,
    RenewalError, RenewalTransport, SessionError, SessionLifecycleManager, TokenTriple,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport_for(server: &MockServer, auth_method: ClientAuthMethod) -> HttpRenewalTransport {
    let config = http_renewal_config()
        .token_endpoint(format!("{}/token", server.uri()))
        .client_id("test-client")
        .client_secret("test-secret")
        .auth_method(auth_method)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    HttpRenewalTransport::new(config).unwrap()
}

#[tokio::test]
async fn test_refresh_grant_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "r1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = transport_for(&server, ClientAuthMethod::ClientSecretBasic);
    let before = chrono::Utc::now();
    let tokens = transport.renew("r0").await.unwrap();

    assert_eq!(tokens.access_token(), "a1");
    assert_eq!(tokens.refresh_token(), "r1");
    assert!(tokens.expires_at() >= before + chrono::Duration::seconds(3600));
}

#[tokio::test]
async fn test_refresh_grant_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Refresh token revoked"
        })))
        .mount(&server)
        .await;

    let transport = transport_for(&server, ClientAuthMethod::ClientSecretPost);
    let error = transport.renew("r0").await.unwrap_err();

    assert_eq!(error, RenewalError::rejected("Refresh token revoked"));
}

#[tokio::test]
async fn test_rate_limit_is_transient_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&server)
        .await;

    let transport = transport_for(&server, ClientAuthMethod::ClientSecretBasic);
    let error = transport.renew("r0").await.unwrap_err();

    assert!(error.is_retryable());
    assert_eq!(
        SessionError::from(error).retry_after(),
        Some(Duration::from_secs(12))
    );
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let transport = transport_for(&server, ClientAuthMethod::ClientSecretBasic);
    assert!(matches!(
        transport.renew("r0").await,
        Err(RenewalError::InvalidResponse { .. })
    ));
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/login", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "phished",
            "expires_in": 3600
        })))
        .expect(0)
        .mount(&server)
        .await;

    let transport = transport_for(&server, ClientAuthMethod::ClientSecretBasic);
    assert!(matches!(
        transport.renew("r0").await,
        Err(RenewalError::InvalidResponse { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transient() {
    let config = http_renewal_config()
        .token_endpoint("http://127.0.0.1:9/token")
        .client_id("test-client")
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let error = HttpRenewalTransport::new(config)
        .unwrap()
        .renew("r0")
        .await
        .unwrap_err();
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_manager_persists_renewed_tokens_to_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a1",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("session.json");
    let backend = Arc::new(FileBackend::new(&file));
    backend
        .write(&TokenTriple::new(
            "a0",
            "r0",
            chrono::Utc::now() + chrono::Duration::minutes(1),
        ))
        .await
        .unwrap();

    let manager = SessionLifecycleManager::builder()
        .backend(backend)
        .transport(Arc::new(transport_for(
            &server,
            ClientAuthMethod::ClientSecretBasic,
        )))
        .build()
        .await
        .unwrap();

    assert_eq!(manager.ensure_fresh().await.unwrap(), "a1");

    let reloaded = FileBackend::new(&file);
    let stored = reloaded
        .read()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token(), "a1");
    // Not rotated by the server.
    assert_eq!(stored.refresh_token(), "r0");
}
