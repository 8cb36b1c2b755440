//! Integration tests for token acquisition
//!
//! Covers the service account assertion exchange, token caching and
//! re-minting near expiry, and the user refresh flow with its on-disk cache.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use confab_core::domain::DomainError;
use confab_drive::auth::{DriveAuth, UserSecrets};

use crate::common;

fn form_params(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn test_user_secrets(token_uri: String) -> UserSecrets {
    UserSecrets {
        client_id: "cid-1".to_string(),
        client_secret: "cs-1".to_string(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_uri,
    }
}

// ============================================================================
// Service account flow
// ============================================================================

#[tokio::test]
async fn test_service_flow_sends_signed_assertion() {
    let server = MockServer::start().await;
    common::mount_token_endpoint(&server).await;

    let key = common::test_service_key(format!("{}/token", server.uri()));
    let auth = DriveAuth::service(key);

    let token = auth.access_token().await.expect("token fetch failed");
    assert_eq!(token, common::TEST_ACCESS_TOKEN);

    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 1);

    let params = form_params(&requests[0].body);
    assert_eq!(
        params.get("grant_type").map(String::as_str),
        Some("urn:ietf:params:oauth:grant-type:jwt-bearer")
    );

    // The assertion is a three-part JWT whose claims name the service
    // account and the token endpoint it was minted for.
    let assertion = params.get("assertion").expect("assertion missing");
    let parts: Vec<&str> = assertion.split('.').collect();
    assert_eq!(parts.len(), 3);

    let claims: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
    assert_eq!(
        claims["iss"],
        "exporter@confab-test.iam.gserviceaccount.com"
    );
    assert_eq!(claims["scope"], "https://www.googleapis.com/auth/drive.file");
    assert_eq!(claims["aud"], format!("{}/token", server.uri()));
    assert_eq!(
        claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
        3600
    );
}

#[tokio::test]
async fn test_service_token_reused_while_valid() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-once",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let key = common::test_service_key(format!("{}/token", server.uri()));
    let auth = DriveAuth::service(key);

    assert_eq!(auth.access_token().await.unwrap(), "at-once");
    assert_eq!(auth.access_token().await.unwrap(), "at-once");
}

#[tokio::test]
async fn test_service_token_reminted_near_expiry() {
    let server = MockServer::start().await;

    // 30 seconds is inside the skew window, so every call re-mints.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-short",
            "expires_in": 30,
            "token_type": "Bearer"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let key = common::test_service_key(format!("{}/token", server.uri()));
    let auth = DriveAuth::service(key);

    assert_eq!(auth.access_token().await.unwrap(), "at-short");
    assert_eq!(auth.access_token().await.unwrap(), "at-short");
}

#[tokio::test]
async fn test_token_endpoint_failure_maps_to_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT signature."
        })))
        .mount(&server)
        .await;

    let key = common::test_service_key(format!("{}/token", server.uri()));
    let auth = DriveAuth::service(key);

    let err = auth.access_token().await.unwrap_err();
    assert!(matches!(err, DomainError::Auth(_)));
    assert!(err.to_string().contains("invalid_grant"));
}

// ============================================================================
// User flow
// ============================================================================

#[tokio::test]
async fn test_user_refresh_preserves_original_refresh_token() {
    let server = MockServer::start().await;

    // Refresh responses from Google carry no refresh_token.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at-fresh",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("token.json");
    std::fs::write(
        &cache_path,
        serde_json::json!({
            "access_token": "at-stale",
            "refresh_token": "rt-original",
            "expires_at": "2020-01-01T00:00:00Z"
        })
        .to_string(),
    )
    .unwrap();

    let auth = DriveAuth::user(
        test_user_secrets(format!("{}/token", server.uri())),
        &cache_path,
    );

    assert_eq!(auth.access_token().await.unwrap(), "at-fresh");

    let cached: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&cache_path).unwrap()).unwrap();
    assert_eq!(cached["access_token"], "at-fresh");
    assert_eq!(cached["refresh_token"], "rt-original");

    let mode = std::fs::metadata(&cache_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    let requests = server.received_requests().await.expect("requests recorded");
    let params = form_params(&requests[0].body);
    assert_eq!(params.get("grant_type").map(String::as_str), Some("refresh_token"));
    assert_eq!(params.get("refresh_token").map(String::as_str), Some("rt-original"));
    assert_eq!(params.get("client_id").map(String::as_str), Some("cid-1"));
    assert_eq!(params.get("client_secret").map(String::as_str), Some("cs-1"));
}

#[tokio::test]
async fn test_user_cache_still_valid_skips_refresh() {
    let server = MockServer::start().await;
    // No token endpoint mounted: any request would 404 and fail the test.

    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("token.json");
    let expires_at = chrono::Utc::now() + chrono::Duration::hours(2);
    std::fs::write(
        &cache_path,
        serde_json::json!({
            "access_token": "at-cached",
            "refresh_token": "rt-1",
            "expires_at": expires_at.to_rfc3339()
        })
        .to_string(),
    )
    .unwrap();

    let auth = DriveAuth::user(
        test_user_secrets(format!("{}/token", server.uri())),
        &cache_path,
    );

    assert_eq!(auth.access_token().await.unwrap(), "at-cached");
}

#[tokio::test]
async fn test_user_without_cache_is_an_auth_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let auth = DriveAuth::user(
        test_user_secrets(format!("{}/token", server.uri())),
        dir.path().join("missing.json"),
    );

    let err = auth.access_token().await.unwrap_err();
    assert!(matches!(err, DomainError::Auth(_)));
    assert!(err.to_string().contains("auth login"));
}

#[tokio::test]
async fn test_user_corrupt_cache_is_an_auth_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("token.json");
    std::fs::write(&cache_path, "{not json").unwrap();

    let auth = DriveAuth::user(
        test_user_secrets(format!("{}/token", server.uri())),
        &cache_path,
    );

    let err = auth.access_token().await.unwrap_err();
    assert!(matches!(err, DomainError::Auth(_)));
    assert!(err.to_string().contains("corrupt"));
}

#[tokio::test]
async fn test_cached_tokens_reads_disk_without_refreshing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("token.json");
    std::fs::write(
        &cache_path,
        serde_json::json!({
            "access_token": "at-stale",
            "refresh_token": "rt-1",
            "expires_at": "2020-01-01T00:00:00Z"
        })
        .to_string(),
    )
    .unwrap();

    let auth = DriveAuth::user(
        test_user_secrets(format!("{}/token", server.uri())),
        &cache_path,
    );

    let tokens = auth.cached_tokens().await.unwrap().expect("cache present");
    // Expired tokens are still reported; callers decide what that means.
    assert!(tokens.needs_refresh());
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));
}
