//! Integration tests for Drive API operations
//!
//! Exercises listing, folder creation, and multipart upload against a
//! wiremock server, including the error mapping that retry classification
//! depends on.

use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use confab_core::domain::{DomainError, RemoteId};
use confab_core::ports::{IRemoteStore, UploadRequest};
use confab_drive::client::DriveClient;

use crate::common;

fn remote_id(value: &str) -> RemoteId {
    RemoteId::new(value.to_string()).unwrap()
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_children_queries_non_trashed_children() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'root-1' in parents and trashed=false"))
        .and(query_param("pageSize", "100"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [
                {
                    "id": "f1",
                    "name": "transcript.txt",
                    "mimeType": "text/plain",
                    "md5Checksum": "9e107d9d372bb6826bd81d3542a419d6"
                },
                {
                    "id": "d1",
                    "name": "recordings",
                    "mimeType": "application/vnd.google-apps.folder"
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(server.uri());
    let page = client
        .list_children("test-token", &remote_id("root-1"), None)
        .await
        .expect("list failed");

    assert_eq!(page.objects.len(), 2);
    assert!(page.next_page_token.is_none());

    let file = &page.objects[0];
    assert_eq!(file.id.as_str(), "f1");
    assert!(!file.is_folder);
    assert_eq!(
        file.content_hash.as_ref().unwrap().as_str(),
        "9e107d9d372bb6826bd81d3542a419d6"
    );

    let folder = &page.objects[1];
    assert!(folder.is_folder);
    assert!(folder.content_hash.is_none());
}

#[tokio::test]
async fn test_list_children_follows_page_tokens() {
    let server = MockServer::start().await;

    // First page hands back a continuation token.
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "page-2",
            "files": [{"id": "f1", "name": "a.txt", "mimeType": "text/plain"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Second page matches only when the token comes back.
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [{"id": "f2", "name": "b.txt", "mimeType": "text/plain"}]
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(server.uri());
    let root = remote_id("root-1");

    let first = client.list_children("t", &root, None).await.unwrap();
    assert_eq!(first.next_page_token.as_deref(), Some("page-2"));

    let second = client
        .list_children("t", &root, first.next_page_token.as_deref())
        .await
        .unwrap();
    assert!(second.next_page_token.is_none());
    assert_eq!(second.objects[0].id.as_str(), "f2");
}

// ============================================================================
// Folder creation
// ============================================================================

#[tokio::test]
async fn test_create_folder_posts_folder_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_json(serde_json::json!({
            "name": "recordings",
            "mimeType": "application/vnd.google-apps.folder",
            "parents": ["root-1"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "folder-9"
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(server.uri());
    let created = client
        .create_folder("test-token", "recordings", &remote_id("root-1"))
        .await
        .expect("create_folder failed");

    assert_eq!(created.as_str(), "folder-9");
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn test_upload_create_sends_multipart_body() {
    let (server, store) = common::setup_drive_store().await;

    let content = b"hello drive";
    let md5_hex = format!("{:x}", md5::compute(content));

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header(
            "content-type",
            "multipart/related; boundary=confab_upload_boundary",
        ))
        .and(body_string_contains(r#""name":"notes.txt""#))
        .and(body_string_contains(r#""parents":["root-1"]"#))
        .and(body_string_contains("hello drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-1",
            "name": "notes.txt",
            "md5Checksum": md5_hex
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("notes.txt");
    std::fs::write(&local, content).unwrap();

    let parent = remote_id("root-1");
    let outcome = store
        .upload(UploadRequest {
            local_path: &local,
            file_name: "notes.txt",
            mime_type: "text/plain",
            parent_id: &parent,
            existing_id: None,
        })
        .await
        .expect("upload failed");

    assert_eq!(outcome.remote_id.as_str(), "file-1");
    assert_eq!(outcome.content_hash.as_str(), md5_hex);
}

#[tokio::test]
async fn test_upload_replace_patches_without_parents() {
    let (server, store) = common::setup_drive_store().await;

    let content = b"second revision";

    // Response omits md5Checksum; the outcome hash must come from the
    // bytes that were sent.
    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/file-9"))
        .and(query_param("uploadType", "multipart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "file-9",
            "name": "notes.txt"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("notes.txt");
    std::fs::write(&local, content).unwrap();

    let parent = remote_id("root-1");
    let existing = remote_id("file-9");
    let outcome = store
        .upload(UploadRequest {
            local_path: &local,
            file_name: "notes.txt",
            mime_type: "text/plain",
            parent_id: &parent,
            existing_id: Some(&existing),
        })
        .await
        .expect("replace failed");

    assert_eq!(outcome.remote_id.as_str(), "file-9");
    assert_eq!(
        outcome.content_hash.as_str(),
        format!("{:x}", md5::compute(content))
    );

    // The update metadata part must not try to set parents.
    let requests = server.received_requests().await.expect("requests recorded");
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .expect("PATCH request recorded");
    let body = String::from_utf8_lossy(&patch.body);
    assert!(body.contains(r#"{"name":"notes.txt"}"#));
    assert!(!body.contains("parents"));
}

#[tokio::test]
async fn test_upload_missing_local_file_is_io_error() {
    let (_server, store) = common::setup_drive_store().await;

    let parent = remote_id("root-1");
    let err = store
        .upload(UploadRequest {
            local_path: std::path::Path::new("/nonexistent/gone.txt"),
            file_name: "gone.txt",
            mime_type: "text/plain",
            parent_id: &parent,
            existing_id: None,
        })
        .await
        .unwrap_err();

    assert!(err.is_local_io());
}

// ============================================================================
// Error mapping
// ============================================================================

#[tokio::test]
async fn test_not_found_maps_to_permanent_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": 404, "message": "File not found: root-1"}
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(server.uri());
    let err = client
        .list_children("t", &remote_id("root-1"), None)
        .await
        .unwrap_err();

    match &err {
        DomainError::Api { status, body } => {
            assert_eq!(*status, 404);
            assert!(body.contains("File not found"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_service_unavailable_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(server.uri());
    let err = client
        .list_children("t", &remote_id("root-1"), None)
        .await
        .unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn test_error_body_is_truncated() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(100_000)))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(server.uri());
    let err = client
        .list_children("t", &remote_id("root-1"), None)
        .await
        .unwrap_err();

    match err {
        DomainError::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body.len(), 64 * 1024);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

// ============================================================================
// Fail-fast connect
// ============================================================================

#[tokio::test]
async fn test_connect_surfaces_credential_problems() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client"
        })))
        .mount(&server)
        .await;

    let key = common::test_service_key(format!("{}/token", server.uri()));
    let auth = confab_drive::auth::DriveAuth::service(key);
    let client = DriveClient::with_base_url(server.uri());
    let store = confab_drive::provider::DriveStore::new(client, auth);

    let err = store.connect().await.unwrap_err();
    assert!(matches!(err, DomainError::Auth(_)));
}
