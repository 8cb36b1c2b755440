//! Upload orchestration
//!
//! The [`Engine`] drives the per-file pipeline: hash, decide, resolve the
//! containing folder, upload with retry, record the result in the ledger.
//! It owns the ledger for the lifetime of a run and writes it back only
//! when [`Engine::persist`] is called.
//!
//! ## Design Notes
//!
//! - Local I/O failures are confined to the file they affect: a batch
//!   logs them and moves on. Remote API failures abort the remainder of
//!   the batch, but everything uploaded before the failure stays in the
//!   in-memory ledger and survives the next persist.
//! - The ledger lock is never held across a network call. The decision
//!   reads under the lock, the upload runs without it, and the entry is
//!   written back under a fresh lock.
//! - Retry handles transient store errors only (429/500/503), with
//!   exponential backoff that aborts promptly on cancellation.

use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use confab_core::domain::{ConflictPolicy, DomainError, RelPath, RemoteId};
use confab_core::ports::remote_store::{IRemoteStore, UploadOutcome, UploadRequest};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::decision::{self, Action};
use crate::folders::FolderCache;
use crate::ledger::{self, SyncEntry, SyncLedger};
use crate::mime;
use crate::SyncError;

// ============================================================================
// Constants
// ============================================================================

/// Total attempts for one remote operation, first try included
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff delay; attempt n waits `BASE_DELAY_SECS * 2^(n-1)`
const BASE_DELAY_SECS: u64 = 1;

// ============================================================================
// Result types
// ============================================================================

/// Counts from one batch upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadStats {
    /// Files newly created remotely
    pub created: u32,
    /// Files whose remote content was replaced
    pub updated: u32,
    /// Files left alone because they were already in sync
    pub skipped: u32,
}

/// Outcome of the per-file pipeline
#[derive(Debug)]
enum SyncOutcome {
    Created(RemoteId),
    Updated(RemoteId),
    Skipped(RemoteId),
}

// ============================================================================
// Engine
// ============================================================================

/// Incremental upload orchestrator
///
/// Holds the sync ledger for one remote root and pushes local files
/// through the decide/upload pipeline. Construct one per run via
/// [`Engine::new`]; the ledger is loaded once and persisted explicitly.
pub struct Engine {
    pub(crate) store: Arc<dyn IRemoteStore>,
    pub(crate) ledger: Mutex<SyncLedger>,
    pub(crate) folders: FolderCache,
    pub(crate) root_id: RemoteId,
    pub(crate) policy: ConflictPolicy,
    ledger_path: PathBuf,
}

impl Engine {
    /// Create an engine for one remote root
    ///
    /// Creates `state_dir` owner-only if missing and loads the ledger
    /// from it. A ledger recorded against a different root is discarded,
    /// so changing the configured root re-uploads rather than mixing
    /// hierarchies.
    ///
    /// # Errors
    /// Returns [`SyncError::Io`] if the state directory cannot be
    /// created.
    pub async fn new(
        store: Arc<dyn IRemoteStore>,
        root_id: RemoteId,
        policy: ConflictPolicy,
        state_dir: &Path,
    ) -> Result<Self, SyncError> {
        create_state_dir(state_dir).await?;
        let ledger_path = state_dir.join(ledger::LEDGER_FILE_NAME);
        let ledger = SyncLedger::load(&ledger_path, &root_id).await;

        info!(
            root = %root_id,
            policy = %policy,
            entries = ledger.entries.len(),
            "sync engine ready"
        );

        Ok(Self {
            folders: FolderCache::new(Arc::clone(&store), root_id.clone()),
            store,
            ledger: Mutex::new(ledger),
            root_id,
            policy,
            ledger_path,
        })
    }

    /// Upload a set of files below a local root
    ///
    /// Paths are processed in order. Files that cannot be read locally
    /// are logged and left out of the stats; the batch continues. A
    /// remote API failure aborts the remaining files, keeping everything
    /// already uploaded in the ledger.
    ///
    /// # Errors
    /// Returns [`SyncError::Cancelled`] when the token fires and
    /// [`SyncError::Store`] on the first non-local failure.
    #[instrument(skip_all, fields(files = rel_paths.len()))]
    pub async fn upload_set(
        &self,
        cancel: &CancellationToken,
        local_root: &Path,
        rel_paths: &[RelPath],
    ) -> Result<UploadStats, SyncError> {
        let mut stats = UploadStats::default();

        for rel_path in rel_paths {
            if cancel.is_cancelled() {
                warn!("cancelled, aborting remaining files");
                return Err(SyncError::Cancelled);
            }

            let abs_path = local_root.join(rel_path.as_str());
            match self.sync_one(cancel, &abs_path, rel_path).await {
                Ok(SyncOutcome::Created(_)) => stats.created += 1,
                Ok(SyncOutcome::Updated(_)) => stats.updated += 1,
                Ok(SyncOutcome::Skipped(_)) => stats.skipped += 1,
                Err(SyncError::Io(e)) => {
                    warn!(path = %rel_path, error = %e, "local read failed, skipping file");
                }
                Err(SyncError::Store(e)) if e.is_local_io() => {
                    warn!(path = %rel_path, error = %e, "local read failed, skipping file");
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            "batch upload complete"
        );
        Ok(stats)
    }

    /// Upload one file, returning its remote id
    ///
    /// Runs the same pipeline as a batch of one, but local read failures
    /// surface as errors instead of being swallowed.
    #[instrument(skip_all, fields(path = %rel_path))]
    pub async fn upload_single(
        &self,
        cancel: &CancellationToken,
        abs_path: &Path,
        rel_path: &RelPath,
    ) -> Result<RemoteId, SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        match self.sync_one(cancel, abs_path, rel_path).await? {
            SyncOutcome::Created(id) | SyncOutcome::Updated(id) | SyncOutcome::Skipped(id) => {
                Ok(id)
            }
        }
    }

    /// Write the ledger back to disk
    ///
    /// # Errors
    /// Ledger persistence failures are the one local error worth
    /// escalating: without the written document the next run forgets
    /// this one.
    pub async fn persist(&self) -> Result<(), SyncError> {
        let mut ledger = self.ledger.lock().await;
        ledger.save(&self.ledger_path).await
    }

    /// Hash, decide and upload one file
    async fn sync_one(
        &self,
        cancel: &CancellationToken,
        abs_path: &Path,
        rel_path: &RelPath,
    ) -> Result<SyncOutcome, SyncError> {
        let metadata = tokio::fs::metadata(abs_path).await?;
        let local_modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let local_hash = match decision::content_md5(abs_path).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(path = %rel_path, error = %e, "failed to hash file, treating content as new");
                None
            }
        };

        let action = {
            let ledger = self.ledger.lock().await;
            decision::decide(
                ledger.entries.get(rel_path),
                local_hash.as_ref(),
                local_modified_at,
                self.policy,
            )
        };

        match action {
            Action::Skip(id) => {
                debug!(path = %rel_path, "content unchanged, skipping");
                Ok(SyncOutcome::Skipped(id))
            }
            Action::Create => {
                let outcome = self.force_upload(cancel, abs_path, rel_path, None).await?;
                info!(path = %rel_path, id = %outcome.remote_id, "file created remotely");
                Ok(SyncOutcome::Created(outcome.remote_id))
            }
            Action::Update(existing) => {
                let outcome = self
                    .force_upload(cancel, abs_path, rel_path, Some(&existing))
                    .await?;
                info!(path = %rel_path, id = %outcome.remote_id, "remote content replaced");
                Ok(SyncOutcome::Updated(outcome.remote_id))
            }
        }
    }

    /// Upload a file unconditionally and record the new ledger entry
    ///
    /// Bypasses change detection; the reconciler uses this to repair
    /// drift that the hash comparison against the ledger cannot see.
    pub(crate) async fn force_upload(
        &self,
        cancel: &CancellationToken,
        abs_path: &Path,
        rel_path: &RelPath,
        existing_id: Option<&RemoteId>,
    ) -> Result<UploadOutcome, SyncError> {
        let metadata = tokio::fs::metadata(abs_path).await?;
        let local_modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        // Folder resolution is idempotent (find before create), so the
        // whole component walk can sit inside the retry envelope.
        let parent_id = with_retry(cancel, "ensure_folder", || {
            self.folders.ensure(rel_path.parent_dir())
        })
        .await?;
        let file_name = rel_path.file_name();
        let mime_type = mime::mime_for(file_name);

        let outcome = with_retry(cancel, "upload", || {
            self.store.upload(UploadRequest {
                local_path: abs_path,
                file_name,
                mime_type,
                parent_id: &parent_id,
                existing_id,
            })
        })
        .await?;

        let mut ledger = self.ledger.lock().await;
        ledger.entries.insert(
            rel_path.clone(),
            SyncEntry {
                remote_object_id: outcome.remote_id.clone(),
                content_hash: outcome.content_hash.clone(),
                size_bytes: metadata.len(),
                local_modified_at,
                uploaded_at: Utc::now(),
            },
        );

        Ok(outcome)
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Run a remote operation, retrying transient failures
///
/// Makes up to [`MAX_ATTEMPTS`] calls with exponential backoff between
/// them. Permanent errors return immediately; cancellation interrupts
/// both the call and the backoff sleep.
pub(crate) async fn with_retry<F, Fut, T>(
    cancel: &CancellationToken,
    operation: &str,
    f: F,
) -> Result<T, SyncError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let result = tokio::select! {
            result = f() => result,
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt, "operation recovered after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                attempt += 1;
                if !err.is_transient() || attempt >= MAX_ATTEMPTS {
                    return Err(SyncError::Store(err));
                }

                let delay_secs = BASE_DELAY_SECS * 2u64.pow(attempt - 1);
                warn!(
                    operation,
                    attempt,
                    delay_secs,
                    error = %err,
                    "transient error, retrying"
                );
                tokio::select! {
                    () = tokio::time::sleep(Duration::from_secs(delay_secs)) => {}
                    () = cancel.cancelled() => return Err(SyncError::Cancelled),
                }
            }
        }
    }
}

/// Create the state directory owner-only if it does not exist
async fn create_state_dir(dir: &Path) -> Result<(), SyncError> {
    tokio::fs::create_dir_all(dir).await?;
    let mut perms = tokio::fs::metadata(dir).await?.permissions();
    perms.set_mode(0o700);
    tokio::fs::set_permissions(dir, perms).await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
