//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Remote object-hierarchy operations (list, create
//!   folder, upload) against the cloud store

pub mod remote_store;

pub use remote_store::{ChildPage, IRemoteStore, RemoteObject, UploadOutcome, UploadRequest};
