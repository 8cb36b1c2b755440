//! Ledger-vs-remote reconciliation
//!
//! The ledger records what this machine uploaded; it knows nothing about
//! what happened remotely since. Reconciliation walks the live remote
//! tree under the target root, compares it against the ledger, and
//! repairs drift from the local side.
//!
//! ## Design Notes
//!
//! - Drift repair is deliberately asymmetric: the local session files are
//!   the source of truth, so repair means re-uploading, never downloading
//!   or deleting remotely.
//! - An entry whose remote object vanished is re-created as a new object;
//!   one whose remote content diverged is replaced in place so the
//!   object's id and any links to it survive.
//! - The `skip` policy extends to reconciliation: remotely modified
//!   objects are counted but left alone. Vanished objects are re-created
//!   under every policy; there is nothing remote left to preserve.

use std::collections::HashMap;
use std::path::Path;

use confab_core::domain::{ConflictPolicy, ContentHash, RelPath, RemoteId};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::engine::{with_retry, Engine};
use crate::ledger::SyncEntry;
use crate::SyncError;

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Ledger entries whose remote object no longer exists
    pub deleted_remotely: u32,
    /// Ledger entries whose remote content hash diverged
    pub modified_remotely: u32,
    /// Ledger entries that match the remote tree
    pub in_sync: u32,
    /// Files re-uploaded to repair drift
    pub re_uploaded: u32,
    /// Remote files under the root with no ledger entry
    pub untracked: u32,
}

impl Engine {
    /// Reconcile the ledger against the live remote tree
    ///
    /// Walks every folder under the target root, classifies each ledger
    /// entry as in sync, modified remotely or deleted remotely, and
    /// re-uploads from `local_root` where drift can be repaired. Remote
    /// files nobody tracks are only counted.
    ///
    /// # Errors
    /// Returns [`SyncError::Cancelled`] when the token fires and
    /// [`SyncError::Store`] on listing or re-upload failures.
    #[instrument(skip_all)]
    pub async fn verify(
        &self,
        cancel: &CancellationToken,
        local_root: &Path,
    ) -> Result<VerifyReport, SyncError> {
        info!(root = %self.root_id, "reconciling ledger against remote tree");

        let mut remote_files = self.walk_remote(cancel).await?;

        // Snapshot the entries so no ledger lock is held across uploads.
        let entries: Vec<_> = {
            let ledger = self.ledger.lock().await;
            ledger
                .entries
                .iter()
                .map(|(path, entry)| (path.clone(), entry.clone()))
                .collect()
        };

        let mut report = VerifyReport::default();

        for (rel_path, entry) in entries {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            match remote_files.remove(&entry.remote_object_id) {
                None => {
                    report.deleted_remotely += 1;
                    let abs_path = local_root.join(rel_path.as_str());
                    if abs_path.exists() {
                        info!(path = %rel_path, "remote object vanished, re-uploading");
                        {
                            let mut ledger = self.ledger.lock().await;
                            ledger.entries.remove(&rel_path);
                        }
                        self.force_upload(cancel, &abs_path, &rel_path, None).await?;
                        report.re_uploaded += 1;
                    } else {
                        debug!(path = %rel_path, "remote object vanished, no local copy to restore");
                    }
                }
                Some(remote_hash) => {
                    if remote_hash.as_ref() == Some(&entry.content_hash) {
                        report.in_sync += 1;
                    } else {
                        report.modified_remotely += 1;
                        self.repair_modified(cancel, local_root, &rel_path, &entry, &mut report)
                            .await?;
                    }
                }
            }
        }

        report.untracked = remote_files.len() as u32;

        info!(
            deleted_remotely = report.deleted_remotely,
            modified_remotely = report.modified_remotely,
            in_sync = report.in_sync,
            re_uploaded = report.re_uploaded,
            untracked = report.untracked,
            "reconciliation complete"
        );
        Ok(report)
    }

    /// Restore a remotely modified object from the local copy
    async fn repair_modified(
        &self,
        cancel: &CancellationToken,
        local_root: &Path,
        rel_path: &RelPath,
        entry: &SyncEntry,
        report: &mut VerifyReport,
    ) -> Result<(), SyncError> {
        if self.policy == ConflictPolicy::Skip {
            debug!(path = %rel_path, "remote content diverged, policy leaves it");
            return Ok(());
        }

        let abs_path = local_root.join(rel_path.as_str());
        if !abs_path.exists() {
            debug!(path = %rel_path, "remote content diverged, no local copy to restore");
            return Ok(());
        }

        info!(path = %rel_path, "remote content diverged, restoring from local copy");
        self.force_upload(cancel, &abs_path, rel_path, Some(&entry.remote_object_id))
            .await?;
        report.re_uploaded += 1;
        Ok(())
    }

    /// Collect every non-folder object under the root, depth first
    ///
    /// Returns a map from remote id to reported content hash. Folder
    /// listings retry on transient errors like uploads do.
    async fn walk_remote(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<RemoteId, Option<ContentHash>>, SyncError> {
        let mut files = HashMap::new();
        let mut stack = vec![self.root_id.clone()];

        while let Some(folder_id) = stack.pop() {
            let mut page_token: Option<String> = None;
            loop {
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }

                let page = with_retry(cancel, "list_children", || {
                    self.store.list_children(&folder_id, page_token.as_deref())
                })
                .await?;

                for object in page.objects {
                    if object.is_folder {
                        stack.push(object.id);
                    } else {
                        files.insert(object.id, object.content_hash);
                    }
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        debug!(files = files.len(), "remote tree walked");
        Ok(files)
    }
}
