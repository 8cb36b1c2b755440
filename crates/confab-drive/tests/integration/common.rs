//! Shared test helpers for Drive API integration tests
//!
//! Provides wiremock-based fixtures: a token endpoint that vends a fixed
//! bearer token, throwaway RSA service keys for signing assertions, and a
//! fully wired DriveStore pointing at the mock server.

use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use confab_drive::auth::{DriveAuth, ServiceKey};
use confab_drive::client::DriveClient;
use confab_drive::provider::DriveStore;

/// Bearer token handed out by the mock token endpoint.
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

/// Generates a throwaway RSA service key whose token endpoint points at
/// the given URI. Small keys keep test startup fast.
pub fn test_service_key(token_uri: String) -> ServiceKey {
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 1024).expect("test key generation");
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .expect("test key encoding")
        .to_string();
    ServiceKey {
        client_email: "exporter@confab-test.iam.gserviceaccount.com".to_string(),
        private_key: pem,
        token_uri,
    }
}

/// Mounts a token endpoint at `/token` that returns [`TEST_ACCESS_TOKEN`]
/// with a one-hour lifetime.
pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": TEST_ACCESS_TOKEN,
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

/// Starts a mock server with a token endpoint and returns a DriveStore
/// wired to it through the service account flow.
pub async fn setup_drive_store() -> (MockServer, DriveStore) {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let key = test_service_key(format!("{}/token", server.uri()));
    let auth = DriveAuth::service(key);
    let client = DriveClient::with_base_url(server.uri());

    (server, DriveStore::new(client, auth))
}
