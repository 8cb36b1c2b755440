//! Confab Sync - incremental upload engine
//!
//! This crate decides what to send, sends it, and remembers what it sent.
//! It sits between the domain layer (`confab-core`) and a concrete remote
//! store adapter, and owns:
//!
//! - The durable sync ledger mapping relative paths to remote objects
//! - Per-file change detection and conflict policy decisions
//! - Remote folder hierarchy resolution with a concurrent id cache
//! - Batch and single-file upload orchestration with retry and
//!   cancellation
//! - Reconciliation of the ledger against the live remote tree
//!
//! ## Modules
//!
//! - [`ledger`]: The persisted sync state document
//! - [`decision`]: Pure create/update/skip logic and content hashing
//! - [`folders`]: Remote folder resolution and caching
//! - [`mime`]: MIME type lookup from file extensions
//! - [`engine`]: The upload orchestrator
//! - [`reconcile`]: Ledger-vs-remote drift detection and repair

pub mod decision;
pub mod engine;
pub mod folders;
pub mod ledger;
pub mod mime;
pub mod reconcile;

use confab_core::domain::DomainError;
use thiserror::Error;

/// Errors surfaced by the sync engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// A local file or ledger I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The ledger document could not be serialized
    #[error("Ledger encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A remote store operation failed
    #[error("Store error: {0}")]
    Store(#[from] DomainError),

    /// The operation was cancelled before it completed
    #[error("Operation cancelled")]
    Cancelled,
}
