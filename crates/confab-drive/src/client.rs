//! Google Drive v3 API client
//!
//! Provides a typed HTTP client for the handful of Drive endpoints the
//! exporter needs: listing folder children, creating folders, and multipart
//! media upload. Callers pass the bearer token per call; token lifetime is
//! the auth module's concern.
//!
//! Error responses are mapped to [`DomainError::Api`] carrying the HTTP
//! status and the response body truncated to [`MAX_ERROR_BODY`], which is
//! what retry classification keys off.

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use confab_core::domain::{ContentHash, DomainError, RemoteId};
use confab_core::ports::{ChildPage, RemoteObject};

use crate::multipart;

/// Base URL for the Google APIs host
const DRIVE_BASE_URL: &str = "https://www.googleapis.com";

/// Metadata endpoint path
const FILES_PATH: &str = "/drive/v3/files";

/// Media upload endpoint path
const UPLOAD_PATH: &str = "/upload/drive/v3/files";

/// MIME type Drive uses to mark folders
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested when listing children
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, md5Checksum)";

/// Fields requested back from an upload
const UPLOAD_FIELDS: &str = "id, name, md5Checksum";

/// Children fetched per list page
const LIST_PAGE_SIZE: &str = "100";

/// Longest error body kept when mapping a failed response
const MAX_ERROR_BODY: usize = 64 * 1024;

// ============================================================================
// Drive API response types
// ============================================================================

/// One page of a `files.list` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    /// Token for the next page, absent on the last one
    next_page_token: Option<String>,
    /// Files in this page
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Minimal projection of a Drive file resource
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,
    /// File name
    pub name: Option<String>,
    /// MIME type; folders carry [`FOLDER_MIME_TYPE`]
    pub mime_type: Option<String>,
    /// MD5 of the content, absent for folders and Google-native documents
    pub md5_checksum: Option<String>,
}

impl DriveFile {
    /// Maps the raw resource onto the port-level object.
    fn into_object(self) -> Result<RemoteObject, DomainError> {
        let is_folder = self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE);
        let content_hash = match self.md5_checksum {
            Some(hex) => Some(ContentHash::new(hex)?),
            None => None,
        };
        Ok(RemoteObject {
            id: RemoteId::new(self.id)?,
            name: self.name.unwrap_or_default(),
            is_folder,
            content_hash,
        })
    }
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Drive v3 API calls
///
/// Wraps `reqwest::Client` with base URL construction. Holds no token state;
/// every method takes the bearer token so no lock sits in front of the
/// network round-trip.
pub struct DriveClient {
    /// The underlying HTTP client
    http: Client,
    /// Base URL for API requests
    base_url: String,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    /// Creates a client against the production Google APIs host.
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_url: DRIVE_BASE_URL.to_string(),
        }
    }

    /// Creates a client with a custom base URL (useful for testing).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Returns the base URL for API requests.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path.
    pub fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.http.request(method, &url).bearer_auth(token)
    }

    /// Lists one page of a folder's direct, non-trashed children.
    ///
    /// Pass the `next_page_token` from the previous page to continue;
    /// `None` in the returned page means the listing is complete.
    pub async fn list_children(
        &self,
        token: &str,
        folder_id: &RemoteId,
        page_token: Option<&str>,
    ) -> Result<ChildPage, DomainError> {
        let query = format!("'{}' in parents and trashed=false", folder_id.as_str());
        debug!(folder = %folder_id, continuation = page_token.is_some(), "listing folder children");

        let mut request = self.request(Method::GET, FILES_PATH, token).query(&[
            ("q", query.as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", LIST_PAGE_SIZE),
        ]);
        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = self.send(request).await?;
        let list: FileList = parse_json(response).await?;

        let mut objects = Vec::with_capacity(list.files.len());
        for file in list.files {
            objects.push(file.into_object()?);
        }

        Ok(ChildPage {
            objects,
            next_page_token: list.next_page_token,
        })
    }

    /// Creates a folder under the given parent and returns its ID.
    pub async fn create_folder(
        &self,
        token: &str,
        name: &str,
        parent_id: &RemoteId,
    ) -> Result<RemoteId, DomainError> {
        info!(name, parent = %parent_id, "creating remote folder");

        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id.as_str()],
        });

        let response = self
            .send(
                self.request(Method::POST, FILES_PATH, token)
                    .query(&[("fields", "id")])
                    .json(&body),
            )
            .await?;
        let file: DriveFile = parse_json(response).await?;
        RemoteId::new(file.id)
    }

    /// Uploads a new file into `parent_id` via multipart media upload.
    pub async fn upload_create(
        &self,
        token: &str,
        name: &str,
        parent_id: &RemoteId,
        content_type: &str,
        content: &[u8],
    ) -> Result<DriveFile, DomainError> {
        debug!(name, parent = %parent_id, size = content.len(), "uploading new file");

        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_id.as_str()],
        });
        self.upload_multipart(token, Method::POST, UPLOAD_PATH.to_string(), &metadata, content_type, content)
            .await
    }

    /// Replaces an existing file's content in place.
    ///
    /// The metadata part carries only the name; parents are immutable on
    /// update and Drive rejects requests that try to set them.
    pub async fn upload_replace(
        &self,
        token: &str,
        file_id: &RemoteId,
        name: &str,
        content_type: &str,
        content: &[u8],
    ) -> Result<DriveFile, DomainError> {
        debug!(id = %file_id, name, size = content.len(), "replacing file content");

        let metadata = serde_json::json!({ "name": name });
        let path = format!("{UPLOAD_PATH}/{}", file_id.as_str());
        self.upload_multipart(token, Method::PATCH, path, &metadata, content_type, content)
            .await
    }

    /// Sends a `multipart/related` upload request and parses the file resource.
    async fn upload_multipart(
        &self,
        token: &str,
        method: Method,
        path: String,
        metadata: &serde_json::Value,
        content_type: &str,
        content: &[u8],
    ) -> Result<DriveFile, DomainError> {
        let body = multipart::related_body(metadata, content_type, content);
        let response = self
            .send(
                self.request(method, &path, token)
                    .query(&[("uploadType", "multipart"), ("fields", UPLOAD_FIELDS)])
                    .header(header::CONTENT_TYPE, multipart::CONTENT_TYPE)
                    .body(body),
            )
            .await?;
        parse_json(response).await
    }

    /// Sends the request, mapping transport failures and non-success statuses.
    async fn send(&self, request: RequestBuilder) -> Result<Response, DomainError> {
        let response = request
            .send()
            .await
            .map_err(|e| DomainError::Network(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(api_error(response).await)
        }
    }
}

// ============================================================================
// Response mapping helpers
// ============================================================================

/// Parses a JSON response body.
async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, DomainError> {
    response
        .json::<T>()
        .await
        .map_err(|e| DomainError::InvalidResponse(e.to_string()))
}

/// Maps a non-success response to [`DomainError::Api`].
pub(crate) async fn api_error(response: Response) -> DomainError {
    let status = response.status().as_u16();
    let body = error_body(response).await;
    DomainError::Api { status, body }
}

/// Reads the response body as text, cut to [`MAX_ERROR_BODY`].
pub(crate) async fn error_body(response: Response) -> String {
    match response.bytes().await {
        Ok(bytes) => {
            let mut body = String::from_utf8_lossy(&bytes).into_owned();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
            body
        }
        Err(_) => String::new(),
    }
}

/// Truncates in place without splitting a multi-byte character.
fn truncate_at_char_boundary(body: &mut String, limit: usize) {
    if body.len() > limit {
        let mut cut = limit;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
}
