//! DriveStore - IRemoteStore implementation for the Drive v3 API
//!
//! Composes [`DriveClient`] and [`DriveAuth`] to fulfil the [`IRemoteStore`]
//! port contract.
//!
//! ## Design Notes
//!
//! - Every call fetches a bearer token from [`DriveAuth`] first. The auth
//!   layer caches and refreshes internally, so no lock is held here across
//!   the API round-trip.
//! - Uploads read the file into memory; export artifacts sit far below the
//!   size where Drive's resumable upload protocol would pay off.
//! - When Drive omits `md5Checksum` in an upload response, the hash of the
//!   bytes that were sent stands in, so the ledger never ends up without a
//!   content hash.

use tracing::debug;

use confab_core::domain::{ContentHash, DomainError, RemoteId};
use confab_core::ports::{ChildPage, IRemoteStore, UploadOutcome, UploadRequest};

use crate::auth::DriveAuth;
use crate::client::DriveClient;

/// Remote store adapter backed by Google Drive.
pub struct DriveStore {
    /// The underlying Drive API client
    client: DriveClient,
    /// Token source
    auth: DriveAuth,
}

impl DriveStore {
    /// Creates a store from a client and an auth flow.
    pub fn new(client: DriveClient, auth: DriveAuth) -> Self {
        Self { client, auth }
    }

    /// Primes the bearer token so credential problems surface before any
    /// sync work starts.
    pub async fn connect(&self) -> Result<(), DomainError> {
        self.auth.access_token().await.map(|_| ())
    }
}

#[async_trait::async_trait]
impl IRemoteStore for DriveStore {
    async fn list_children(
        &self,
        folder_id: &RemoteId,
        page_token: Option<&str>,
    ) -> Result<ChildPage, DomainError> {
        let token = self.auth.access_token().await?;
        self.client
            .list_children(&token, folder_id, page_token)
            .await
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: &RemoteId,
    ) -> Result<RemoteId, DomainError> {
        let token = self.auth.access_token().await?;
        self.client.create_folder(&token, name, parent_id).await
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<UploadOutcome, DomainError> {
        let token = self.auth.access_token().await?;

        let content = tokio::fs::read(request.local_path).await.map_err(|e| {
            DomainError::Io(format!(
                "failed to read {}: {e}",
                request.local_path.display()
            ))
        })?;

        let file = match request.existing_id {
            Some(id) => {
                debug!(id = %id, name = request.file_name, "upload: replacing existing file");
                self.client
                    .upload_replace(&token, id, request.file_name, request.mime_type, &content)
                    .await?
            }
            None => {
                debug!(
                    parent = %request.parent_id,
                    name = request.file_name,
                    "upload: creating new file"
                );
                self.client
                    .upload_create(
                        &token,
                        request.file_name,
                        request.parent_id,
                        request.mime_type,
                        &content,
                    )
                    .await?
            }
        };

        let content_hash = match file.md5_checksum {
            Some(hex) => ContentHash::new(hex)?,
            None => ContentHash::new(format!("{:x}", md5::compute(&content)))?,
        };

        Ok(UploadOutcome {
            remote_id: RemoteId::new(file.id)?,
            content_hash,
        })
    }
}
