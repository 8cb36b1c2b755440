//! Confab Drive - Google Drive v3 API adapter
//!
//! Provides the async client for:
//! - OAuth2 token acquisition (service account JWT bearer and installed-app code flow)
//! - Folder listing and creation under the artifact root
//! - Multipart media upload for creating and replacing files
//!
//! ## Modules
//!
//! - [`auth`] - Token acquisition, refresh, and the on-disk token cache
//! - [`client`] - Drive v3 HTTP client and response mapping
//! - [`multipart`] - `multipart/related` body assembly for uploads
//! - [`provider`] - [`provider::DriveStore`], the `IRemoteStore` adapter
//!
//! Failures surface as [`confab_core::domain::DomainError`]; HTTP error
//! responses keep their status code and (truncated) body so callers can
//! classify what is worth retrying.

pub mod auth;
pub mod client;
pub mod multipart;
pub mod provider;
