//! Confab Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemoteId`, `ContentHash`, `RelPath`, `ConflictPolicy`
//! - **Port definitions** - The `IRemoteStore` trait that the remote adapter implements
//! - **Configuration** - Typed YAML configuration with validation and a builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure validation logic with no I/O. Ports define
//! trait interfaces that adapter crates implement; the sync engine depends
//! only on this crate and drives adapters through the port traits.

pub mod config;
pub mod domain;
pub mod ports;
