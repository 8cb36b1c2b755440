//! Integration tests for confab-drive
//!
//! Uses wiremock to simulate the Google OAuth2 token endpoint and the
//! Drive v3 API, and verifies end-to-end behavior of token acquisition,
//! listing, folder creation, and multipart uploads.

mod common;

mod test_auth;
mod test_client;
