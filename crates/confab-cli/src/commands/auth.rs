//! Auth commands - Login and Status for the configured credential flow
//!
//! Provides the `confab auth` CLI subcommands which:
//! 1. `login`  - Primes credentials: verifies the key in service mode, runs
//!    the one-time browser authorization in user mode (or silently refreshes
//!    a cached token when one exists).
//! 2. `status` - Reports the credential mode and cached-token expiry without
//!    touching the token endpoint or prompting.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Prime credentials for the configured mode
    Login,
    /// Check credential status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        match self {
            AuthCommand::Login => self.execute_login(&*fmt, config_path).await,
            AuthCommand::Status => self.execute_status(&*fmt, format, config_path).await,
        }
    }

    /// Execute the login flow:
    /// 1. Load config and the credential file for the configured mode
    /// 2. User mode with a cached refresh token: silent refresh, no prompt
    /// 3. Otherwise run the flow's login step (interactive for user mode,
    ///    a mint-and-discard token check for service mode)
    async fn execute_login(
        &self,
        fmt: &dyn crate::output::OutputFormatter,
        config_path: &Path,
    ) -> Result<()> {
        use confab_core::config::{expand_tilde, AuthMode, Config};
        use confab_drive::auth::{DriveAuth, ServiceKey, UserSecrets};

        // Step 1: Load config and build the credential flow
        let config = Config::load_or_default(config_path);
        info!(config_path = %config_path.display(), mode = %config.auth.mode, "Starting login");

        let credentials_path = expand_tilde(&config.auth.credentials_path);
        let auth = match config.auth.mode {
            AuthMode::Service => {
                let key = ServiceKey::load(&credentials_path).with_context(|| {
                    format!(
                        "failed to load the service key at {}",
                        credentials_path.display()
                    )
                })?;
                DriveAuth::service(key)
            }
            AuthMode::User => {
                let secrets = UserSecrets::load(&credentials_path).with_context(|| {
                    format!(
                        "failed to load the client secrets at {}",
                        credentials_path.display()
                    )
                })?;
                DriveAuth::user(secrets, expand_tilde(&config.auth.token_cache_path))
            }
        };

        // Step 2: A cache with a refresh token only needs a silent refresh.
        // An unreadable cache falls through to a fresh interactive login.
        let cached = auth.cached_tokens().await.unwrap_or(None);
        if cached.as_ref().is_some_and(|t| t.refresh_token.is_some()) {
            auth.access_token().await.context(
                "stored token could not be refreshed; delete the token cache and log in again",
            )?;
            fmt.success("Already logged in; token refreshed");
            return Ok(());
        }

        // Step 3: Run the flow's login step
        auth.login().await.context("login failed")?;

        match config.auth.mode {
            AuthMode::Service => fmt.success("Service key verified"),
            AuthMode::User => {
                fmt.success("Authorization complete");
                fmt.info(&format!(
                    "Tokens cached at {}",
                    expand_tilde(&config.auth.token_cache_path).display()
                ));
            }
        }

        Ok(())
    }

    /// Execute the status check:
    /// 1. Load config and probe the credential file
    /// 2. User mode: read the token cache (no refresh, no prompt)
    /// 3. Display mode, credential state, and token expiry
    async fn execute_status(
        &self,
        fmt: &dyn crate::output::OutputFormatter,
        format: OutputFormat,
        config_path: &Path,
    ) -> Result<()> {
        use confab_core::config::{expand_tilde, AuthMode, Config};
        use confab_drive::auth::{DriveAuth, ServiceKey, UserSecrets};

        let config = Config::load_or_default(config_path);
        let credentials_path = expand_tilde(&config.auth.credentials_path);

        info!(mode = %config.auth.mode, "Checking credential status");

        // No token endpoint calls here; status must never block on a prompt.
        let (credentials_status, token_status, expires_at) = match config.auth.mode {
            AuthMode::Service => {
                let credentials_status = match ServiceKey::load(&credentials_path) {
                    Ok(_) => "ok",
                    Err(_) => "missing or invalid",
                };
                (credentials_status, "minted per run", None)
            }
            AuthMode::User => match UserSecrets::load(&credentials_path) {
                Ok(secrets) => {
                    let auth =
                        DriveAuth::user(secrets, expand_tilde(&config.auth.token_cache_path));
                    match auth.cached_tokens().await {
                        Ok(Some(tokens)) => {
                            let status = if tokens.needs_refresh() {
                                "expired"
                            } else {
                                "valid"
                            };
                            ("ok", status, Some(tokens.expires_at))
                        }
                        Ok(None) => ("ok", "not logged in", None),
                        Err(_) => ("ok", "cache unreadable", None),
                    }
                }
                Err(_) => ("missing or invalid", "unknown", None),
            },
        };

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::json!({
                "mode": config.auth.mode.as_str(),
                "credentials_path": credentials_path.display().to_string(),
                "credentials": credentials_status,
                "token_status": token_status,
                "expires_at": expires_at.map(|t| t.to_rfc3339()),
            });
            fmt.print_json(&json);
        } else {
            fmt.success(&format!("Credential mode: {}", config.auth.mode));
            fmt.info(&format!(
                "Credentials:  {} ({})",
                credentials_path.display(),
                credentials_status
            ));
            fmt.info(&format!("Token status: {token_status}"));
            if let Some(expires_at) = expires_at {
                fmt.info(&format!(
                    "Expires:      {}",
                    expires_at.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            }
            if token_status == "not logged in" {
                fmt.info("Run 'confab auth login' to authorize");
            }
        }

        Ok(())
    }
}
