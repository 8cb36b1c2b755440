//! Remote store port (driven/secondary port)
//!
//! This module defines the interface for the remote object-hierarchy API.
//! The primary implementation targets Google Drive, but the trait only
//! assumes a store with folders, named objects, opaque IDs and content
//! hashes, so other hierarchy APIs could back it.
//!
//! ## Design Notes
//!
//! - Returns [`DomainError`] rather than `anyhow::Error` so the engine can
//!   classify transience (retry 429/500/503, surface the rest) without
//!   downcasting.
//! - [`RemoteObject`] is a port-level DTO projecting only the fields the
//!   engine consumes; adapters drop everything else at the wire.
//! - `upload` takes a request struct so a resumable/chunked variant can be
//!   added later without breaking every implementor.

use std::path::Path;

use crate::domain::errors::DomainError;
use crate::domain::newtypes::{ContentHash, RemoteId};

// ============================================================================
// Port-level DTOs
// ============================================================================

/// Client-side view of one remote object
///
/// Ephemeral: fetched on demand during listing, never persisted beyond the
/// current operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Provider-specific object identifier
    pub id: RemoteId,
    /// Object name within its parent folder
    pub name: String,
    /// Whether the object is a folder
    pub is_folder: bool,
    /// Content hash (None for folders and non-binary provider documents)
    pub content_hash: Option<ContentHash>,
}

/// One page of a folder listing
#[derive(Debug, Clone)]
pub struct ChildPage {
    /// Direct, non-trashed children of the requested folder
    pub objects: Vec<RemoteObject>,
    /// Token for the next page (None on the last page)
    pub next_page_token: Option<String>,
}

/// Parameters for a single-request content upload
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    /// Local file whose bytes are uploaded
    pub local_path: &'a Path,
    /// Name the object carries remotely
    pub file_name: &'a str,
    /// MIME type sent with the content
    pub mime_type: &'a str,
    /// Parent folder for newly created objects
    pub parent_id: &'a RemoteId,
    /// When set, replace this object's content in place instead of
    /// creating a new object; identity and external references survive
    pub existing_id: Option<&'a RemoteId>,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Identifier of the created or replaced object
    pub remote_id: RemoteId,
    /// Content hash of the stored bytes, as the remote reports it
    pub content_hash: ContentHash,
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for remote object-hierarchy operations
///
/// This is the engine's only interface to the cloud store. Implementations
/// handle authentication (acquiring a bearer token per call), the wire
/// protocol, and error mapping into [`DomainError`].
///
/// ## Implementation Notes
///
/// - No method retries internally; the engine owns retry policy and must
///   be able to count attempts.
/// - `list_children` never recurses; walking into subfolders is the
///   caller's job.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Lists one page of a folder's direct children
    ///
    /// Returns objects that are not trashed, projected to the fields in
    /// [`RemoteObject`].
    ///
    /// # Arguments
    /// * `folder_id` - Parent folder to list
    /// * `page_token` - Continuation token from a previous page, if any
    async fn list_children(
        &self,
        folder_id: &RemoteId,
        page_token: Option<&str>,
    ) -> Result<ChildPage, DomainError>;

    /// Creates an empty folder
    ///
    /// # Arguments
    /// * `name` - Folder name
    /// * `parent_id` - Folder under which to create it
    ///
    /// # Returns
    /// The new folder's remote ID
    async fn create_folder(&self, name: &str, parent_id: &RemoteId)
        -> Result<RemoteId, DomainError>;

    /// Creates or replaces a file's content in a single multipart request
    ///
    /// With `existing_id` unset, a new object is created under
    /// `parent_id`; otherwise the existing object's content is replaced in
    /// place.
    ///
    /// # Returns
    /// The object's remote ID and stored content hash
    async fn upload(&self, request: UploadRequest<'_>) -> Result<UploadOutcome, DomainError>;
}
