//! Verify command - reconcile the sync ledger against the remote listing
//!
//! Provides the `confab verify` CLI command which:
//! 1. Loads configuration and connects the remote store
//! 2. Walks the remote tree and compares it against the ledger
//! 3. Re-uploads drifted files according to the conflict policy
//! 4. Persists the ledger and prints the drift counters

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct VerifyCommand {
    /// Local directory that mirrors the remote root
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,
}

impl VerifyCommand {
    /// Execute the verify command.
    ///
    /// Repairs performed before an interruption are kept; the ledger is
    /// persisted exactly once, whatever the walk's outcome.
    pub async fn execute(
        &self,
        format: OutputFormat,
        config_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        use std::sync::Arc;

        use confab_core::config::{expand_tilde, AuthMode, Config};
        use confab_core::domain::RemoteId;
        use confab_drive::auth::{DriveAuth, ServiceKey, UserSecrets};
        use confab_drive::client::DriveClient;
        use confab_drive::provider::DriveStore;
        use confab_sync::engine::Engine;
        use confab_sync::SyncError;

        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        // Step 1: Load config and resolve the destination folder
        let config = Config::load_or_default(config_path);
        info!(config_path = %config_path.display(), "Loaded configuration");

        let root_folder_id = match &config.remote.root_folder_id {
            Some(id) => RemoteId::new(id.clone())
                .context("remote.root_folder_id is not a valid folder id")?,
            None => {
                formatter
                    .error("No remote folder configured. Set remote.root_folder_id in config.yaml.");
                return Ok(());
            }
        };

        // Step 2: Build the credential flow and prove it works
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

        let store = DriveStore::new(DriveClient::new(), auth);
        store
            .connect()
            .await
            .context("credential check failed; run 'confab auth login' first")?;
        let store = Arc::new(store);

        // Step 3: Open the sync session and reconcile
        let session_dir = expand_tilde(&config.sync.session_dir);
        let engine = Engine::new(
            store,
            root_folder_id,
            config.sync.conflict_policy,
            &session_dir,
        )
        .await
        .context("failed to open the sync session")?;

        formatter.info("Comparing the ledger against the remote listing...");

        let outcome = engine.verify(cancel, &self.root).await;

        // The ledger is written once per run, whatever the walk's outcome.
        engine
            .persist()
            .await
            .context("failed to persist the sync ledger")?;

        let report = match outcome {
            Err(SyncError::Cancelled) => {
                formatter.warn("verification interrupted; repairs made so far were recorded");
                bail!("cancelled");
            }
            other => other.context("verification failed")?,
        };

        // Step 4: Display results
        if matches!(format, OutputFormat::Json) {
            let json = serde_json::json!({
                "in_sync": report.in_sync,
                "deleted_remotely": report.deleted_remotely,
                "modified_remotely": report.modified_remotely,
                "re_uploaded": report.re_uploaded,
                "untracked": report.untracked,
            });
            formatter.print_json(&json);
        } else {
            if report.deleted_remotely == 0 && report.modified_remotely == 0 {
                formatter.success("Remote matches the ledger");
            } else {
                formatter.success("Verification completed");
            }
            formatter.info(&format!("In sync:           {}", report.in_sync));
            formatter.info(&format!("Deleted remotely:  {}", report.deleted_remotely));
            formatter.info(&format!("Modified remotely: {}", report.modified_remotely));
            formatter.info(&format!("Re-uploaded:       {}", report.re_uploaded));
            formatter.info(&format!("Untracked remote:  {}", report.untracked));
        }

        Ok(())
    }
}
