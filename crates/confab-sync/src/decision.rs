//! Upload decisions
//!
//! Pure logic for classifying one local file against its ledger entry:
//! create it remotely, replace the remote content, or leave it alone.
//! Keeping this free of I/O makes the policy matrix directly testable.

use chrono::{DateTime, Utc};
use confab_core::domain::{ConflictPolicy, ContentHash, RemoteId};
use std::path::Path;

use crate::ledger::SyncEntry;
use crate::SyncError;

/// What the uploader should do with one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No usable remote counterpart; upload as a new object
    Create,
    /// Replace the content of this remote object in place
    Update(RemoteId),
    /// Leave this remote object alone
    Skip(RemoteId),
}

/// Classify a file given its ledger entry and freshly observed state
///
/// A file without an entry is always created. A hash equal to the
/// recorded one means the content is unchanged and the file is skipped
/// regardless of policy. A missing hash cannot prove anything and falls
/// back to create. Only genuine divergence consults the conflict policy.
#[must_use]
pub fn decide(
    entry: Option<&SyncEntry>,
    local_hash: Option<&ContentHash>,
    local_modified_at: DateTime<Utc>,
    policy: ConflictPolicy,
) -> Action {
    let Some(entry) = entry else {
        return Action::Create;
    };
    let Some(hash) = local_hash else {
        return Action::Create;
    };

    if entry.content_hash == *hash {
        return Action::Skip(entry.remote_object_id.clone());
    }

    match policy {
        ConflictPolicy::LocalWins => Action::Update(entry.remote_object_id.clone()),
        ConflictPolicy::Skip => Action::Skip(entry.remote_object_id.clone()),
        ConflictPolicy::NewerWins => {
            if local_modified_at > entry.uploaded_at {
                Action::Update(entry.remote_object_id.clone())
            } else {
                Action::Skip(entry.remote_object_id.clone())
            }
        }
    }
}

/// Compute the MD5 content hash of a file, lowercase hex
///
/// Reads the whole file into memory; session files are small enough that
/// streaming is not worth the complexity.
///
/// # Errors
/// Returns [`SyncError::Io`] if the file cannot be read.
pub async fn content_md5(path: &Path) -> Result<ContentHash, SyncError> {
    let bytes = tokio::fs::read(path).await?;
    let hash = ContentHash::new(format!("{:x}", md5::compute(&bytes)))?;
    Ok(hash)
}

// ============================================================================
// Tests
// ============================================================================
