//! Tests for the auth module

use super::*;
use crate::error::Error;
use crate::http::{HttpRequest, ReqwestTransport};
use base64::Engine;
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(config: AuthConfig) -> AuthProvider {
    AuthProvider::with_transport(
        config,
        Arc::new(ReqwestTransport::from_client(reqwest::Client::new())),
    )
}

fn client_credentials(token_url: String) -> AuthConfig {
    AuthConfig::OAuth2ClientCredentials {
        token_url,
        client_id: "my-client".to_string(),
        client_secret: "my-secret".to_string(),
        scopes: vec![],
        token_body: BTreeMap::new(),
        client_auth: ClientAuth::Body,
    }
}

// ============================================================================
// Static strategies
// ============================================================================

#[tokio::test]
async fn test_no_auth() {
    let auth = provider(AuthConfig::None);
    let mut req = HttpRequest::get("https://example.com/api");

    auth.apply(&mut req).await.unwrap();
    assert!(req.headers.is_empty());
    assert!(req.query.is_empty());
}

#[tokio::test]
async fn test_api_key_header_with_prefix() {
    let auth = provider(AuthConfig::ApiKey {
        location: Location::Header,
        name: "Authorization".to_string(),
        prefix: Some("Token ".to_string()),
        value: "my-token".to_string(),
    });

    let mut req = HttpRequest::get("https://example.com/api");
    auth.apply(&mut req).await.unwrap();
    assert_eq!(req.header_value("Authorization"), Some("Token my-token"));
}

#[tokio::test]
async fn test_api_key_query() {
    let auth = provider(AuthConfig::ApiKey {
        location: Location::Query,
        name: "apikey".to_string(),
        prefix: None,
        value: "secret123".to_string(),
    });

    let mut req = HttpRequest::get("https://example.com/api");
    auth.apply(&mut req).await.unwrap();
    assert_eq!(req.query_value("apikey"), Some("secret123"));
}

#[tokio::test]
async fn test_basic_auth() {
    // Freshdesk style: API key as username, empty password
    let auth = provider(AuthConfig::Basic {
        username: "fd-key".to_string(),
        password: String::new(),
    });

    let mut req = HttpRequest::get("https://example.com/api");
    auth.apply(&mut req).await.unwrap();

    let header = req.header_value("Authorization").unwrap();
    let encoded = header.strip_prefix("Basic ").unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "fd-key:");
}

#[tokio::test]
async fn test_bearer_auth() {
    let auth = provider(AuthConfig::Bearer {
        token: "ghp_token".to_string(),
    });

    let mut req = HttpRequest::get("https://example.com/api");
    auth.apply(&mut req).await.unwrap();
    assert_eq!(req.header_value("Authorization"), Some("Bearer ghp_token"));
}

#[tokio::test]
async fn test_static_refresh_is_noop() {
    let auth = provider(AuthConfig::Bearer {
        token: "ghp_token".to_string(),
    });

    let credential = auth.acquire().await.unwrap();
    let refreshed = auth.refresh(&credential).await.unwrap();
    assert_eq!(credential, refreshed);
    assert!(!auth.is_refreshable());
}

// ============================================================================
// OAuth2 flows
// ============================================================================

#[tokio::test]
async fn test_oauth2_client_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=my-client"))
        .and(body_string_contains("client_secret=my-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "oauth-token-123",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(&mock_server)
        .await;

    let auth = provider(client_credentials(format!(
        "{}/oauth/token",
        mock_server.uri()
    )));

    let mut req = HttpRequest::get("https://example.com/api");
    let credential = auth.apply(&mut req).await.unwrap();

    assert_eq!(
        req.header_value("Authorization"),
        Some("Bearer oauth-token-123")
    );
    assert!(credential.expires_at.is_some());
}

#[tokio::test]
async fn test_oauth2_basic_header_account_credentials() {
    let mock_server = MockServer::start().await;
    let expected = format!("Basic {}", basic_token("zoom-id", "zoom-secret"));

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("Authorization", expected.as_str()))
        .and(body_string_contains("grant_type=account_credentials"))
        .and(body_string_contains("account_id=acc-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "zoom-token",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut token_body = BTreeMap::new();
    token_body.insert("grant_type".to_string(), "account_credentials".to_string());
    token_body.insert("account_id".to_string(), "acc-42".to_string());

    let auth = provider(AuthConfig::OAuth2ClientCredentials {
        token_url: format!("{}/oauth/token", mock_server.uri()),
        client_id: "zoom-id".to_string(),
        client_secret: "zoom-secret".to_string(),
        scopes: vec![],
        token_body,
        client_auth: ClientAuth::BasicHeader,
    });

    let credential = auth.acquire().await.unwrap();
    assert_eq!(credential.token, "zoom-token");
}

#[tokio::test]
async fn test_oauth2_token_caching() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "cached-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = provider(client_credentials(format!(
        "{}/oauth/token",
        mock_server.uri()
    )));

    for _ in 0..3 {
        let mut req = HttpRequest::get("https://example.com/api");
        auth.apply(&mut req).await.unwrap();
    }
}

#[tokio::test]
async fn test_concurrent_acquire_is_single_flight() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "access_token": "shared-token",
                    "expires_in": 3600
                }))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = Arc::new(provider(client_credentials(format!(
        "{}/oauth/token",
        mock_server.uri()
    ))));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let auth = Arc::clone(&auth);
            tokio::spawn(async move { auth.acquire().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().token, "shared-token");
    }
}

#[tokio::test]
async fn test_expired_token_is_reacquired() {
    let mock_server = MockServer::start().await;

    // Expires inside the 30 second safety buffer
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "short-lived",
            "expires_in": 5
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let auth = provider(client_credentials(format!(
        "{}/oauth/token",
        mock_server.uri()
    )));

    auth.acquire().await.unwrap();
    auth.acquire().await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_request_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = provider(client_credentials(format!(
        "{}/oauth/token",
        mock_server.uri()
    )));

    let first = auth.acquire().await.unwrap_err();
    assert!(matches!(first, Error::Credential { .. }));
    assert!(first.to_string().contains("invalid_client"));

    let second = auth.acquire().await.unwrap_err();
    assert!(matches!(second, Error::Credential { .. }));
}

#[tokio::test]
async fn test_refresh_reissues_token_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "first",
            "expires_in": 3600
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "second",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = provider(client_credentials(format!(
        "{}/oauth/token",
        mock_server.uri()
    )));

    let old = auth.acquire().await.unwrap();
    assert_eq!(old.token, "first");

    let fresh = auth.refresh(&old).await.unwrap();
    assert_eq!(fresh.token, "second");

    // A stale caller refreshing the same old credential gets the new one
    // without another token request
    let again = auth.refresh(&old).await.unwrap();
    assert_eq!(again.token, "second");
}

#[tokio::test]
async fn test_oauth2_refresh_token_flow() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=my-refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "refreshed-token",
            "expires_in": 3600,
            "refresh_token": "rotated"
        })))
        .mount(&mock_server)
        .await;

    let auth = provider(AuthConfig::OAuth2Refresh {
        token_url: format!("{}/oauth/token", mock_server.uri()),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "my-refresh-token".to_string(),
    });

    let mut req = HttpRequest::get("https://example.com/api");
    let credential = auth.apply(&mut req).await.unwrap();

    assert_eq!(
        req.header_value("Authorization"),
        Some("Bearer refreshed-token")
    );
    assert_eq!(credential.refresh_token.as_deref(), Some("rotated"));
}
