//! Domain types and business rules
//!
//! This module contains the core domain types for Confab:
//! - Newtypes for type-safe identifiers and validated values
//! - The conflict policy applied when local and remote content diverge
//! - Domain-specific error types with transience classification

pub mod errors;
pub mod newtypes;
pub mod policy;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::{ContentHash, RelPath, RemoteId};
pub use policy::ConflictPolicy;
