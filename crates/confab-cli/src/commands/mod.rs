//! Subcommand implementations.
//!
//! Each module owns one `confab` subcommand: its clap definition and an
//! `execute` entry point that wires up the adapters it needs.

pub mod auth;
pub mod config;
pub mod push;
pub mod verify;
