//! Durable sync ledger
//!
//! The ledger is the engine's memory of what has already been uploaded:
//! one JSON document per session directory mapping relative paths to the
//! remote object they were last synced to. It is loaded once when the
//! engine starts and written back atomically on persist.
//!
//! ## Design Notes
//!
//! - A missing or unreadable ledger is never fatal. The engine starts
//!   from an empty document and re-uploads; the remote side deduplicates
//!   nothing, but no data is lost.
//! - The document records the remote root it was built against. When the
//!   configured root changes, every entry refers to objects under the old
//!   root and is discarded wholesale.
//! - Entries are kept in a `BTreeMap` so the serialized document is
//!   deterministic and diffs cleanly between runs.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use confab_core::domain::{ContentHash, RelPath, RemoteId};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::SyncError;

// ============================================================================
// Constants
// ============================================================================

/// Schema version written to new ledger documents
pub const SCHEMA_VERSION: u32 = 1;

/// File name of the ledger within a session directory
pub const LEDGER_FILE_NAME: &str = "sync-state.json";

// ============================================================================
// Document types
// ============================================================================

/// Last-known-synced state for one relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEntry {
    /// Remote object this path was last uploaded to
    pub remote_object_id: RemoteId,

    /// MD5 of the content at upload time, lowercase hex
    pub content_hash: ContentHash,

    /// Size of the local file at upload time
    pub size_bytes: u64,

    /// Local modification time observed at upload time
    pub local_modified_at: DateTime<Utc>,

    /// When the upload completed
    pub uploaded_at: DateTime<Utc>,
}

/// The persisted sync state document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLedger {
    /// Document schema version
    pub schema_version: u32,

    /// When the ledger was last persisted
    pub last_sync_timestamp: DateTime<Utc>,

    /// Remote root folder the entries belong to
    pub target_root_id: RemoteId,

    /// Synced state keyed by relative path
    #[serde(default)]
    pub entries: BTreeMap<RelPath, SyncEntry>,
}

impl SyncLedger {
    /// Create an empty ledger bound to a remote root
    #[must_use]
    pub fn empty(target_root_id: RemoteId) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_sync_timestamp: Utc::now(),
            target_root_id,
            entries: BTreeMap::new(),
        }
    }

    /// Load the ledger from disk, falling back to an empty document
    ///
    /// A missing file, unreadable file, or corrupt document all degrade to
    /// an empty ledger; the cost is re-uploading, never data loss. A
    /// document built against a different remote root is discarded the
    /// same way.
    pub async fn load(path: &Path, configured_root: &RemoteId) -> Self {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger on disk, starting empty");
                return Self::empty(configured_root.clone());
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read ledger, starting empty"
                );
                return Self::empty(configured_root.clone());
            }
        };

        let ledger: Self = match serde_json::from_slice(&bytes) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "ledger document is corrupt, starting empty"
                );
                return Self::empty(configured_root.clone());
            }
        };

        if ledger.target_root_id != *configured_root {
            warn!(
                previous_root = %ledger.target_root_id,
                configured_root = %configured_root,
                "remote root changed, discarding ledger entries"
            );
            return Self::empty(configured_root.clone());
        }

        debug!(entries = ledger.entries.len(), "ledger loaded");
        ledger
    }

    /// Persist the ledger atomically
    ///
    /// Writes the full document to a `.tmp` sibling with owner-only
    /// permissions and renames it into place, so a crash mid-write leaves
    /// the previous ledger intact. Refreshes [`last_sync_timestamp`]
    /// before serializing.
    ///
    /// [`last_sync_timestamp`]: SyncLedger::last_sync_timestamp
    ///
    /// # Errors
    /// Returns [`SyncError::Encode`] if serialization fails and
    /// [`SyncError::Io`] if the write or rename fails.
    pub async fn save(&mut self, path: &Path) -> Result<(), SyncError> {
        self.last_sync_timestamp = Utc::now();
        let json = serde_json::to_vec_pretty(self)?;

        // Same-directory sibling keeps the final rename atomic.
        let tmp_path = tmp_sibling(path);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&tmp_path)
            .await?;
        file.write_all(&json).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, path).await?;

        info!(
            path = %path.display(),
            entries = self.entries.len(),
            "ledger persisted"
        );
        Ok(())
    }
}

/// Build the temporary sibling path for an atomic write
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

// ============================================================================
// Tests
// ============================================================================
