//! Push command - upload local files into the configured remote folder
//!
//! Provides the `confab push` CLI command which:
//! 1. Loads configuration and builds the credential flow for the configured mode
//! 2. Connects the remote store (fails fast on credential problems)
//! 3. Assembles the upload set (explicit arguments, or a walk of the root)
//! 4. Runs the upload engine, persists the ledger, and prints the counters

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use confab_core::domain::RelPath;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct PushCommand {
    /// Local directory that mirrors the remote root
    #[arg(long, value_name = "DIR")]
    pub root: PathBuf,

    /// Relative paths to upload (everything under the root when omitted)
    #[arg(value_name = "REL_PATH")]
    pub paths: Vec<String>,
}

impl PushCommand {
    /// Execute the push command.
    ///
    /// Per-file failures are logged by the engine and the run continues;
    /// the ledger is persisted exactly once, even when the batch stops
    /// early, so completed uploads survive for the next run.
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

        // Step 2: Assemble the upload set before touching the network
        let rel_paths = if self.paths.is_empty() {
            collect_files(&self.root).context("failed to walk the local root")?
        } else {
            let mut parsed = Vec::with_capacity(self.paths.len());
            for raw in &self.paths {
                let rel = RelPath::new(raw.clone())
                    .with_context(|| format!("invalid relative path {raw:?}"))?;
                parsed.push(rel);
            }
            parsed
        };

        if rel_paths.is_empty() {
            formatter.success("Nothing to upload");
            return Ok(());
        }
        info!(files = rel_paths.len(), "Upload set assembled");

        // Step 3: Build the credential flow and prove it works
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

        // Step 4: Open the sync session and run the batch
        let session_dir = expand_tilde(&config.sync.session_dir);
        let engine = Engine::new(
            store,
            root_folder_id,
            config.sync.conflict_policy,
            &session_dir,
        )
        .await
        .context("failed to open the sync session")?;

        formatter.info(&format!(
            "Uploading {} file{}...",
            rel_paths.len(),
            if rel_paths.len() == 1 { "" } else { "s" }
        ));

        let started = std::time::Instant::now();
        let outcome = engine.upload_set(cancel, &self.root, &rel_paths).await;

        // The ledger is written once per run, whatever the batch outcome.
        engine
            .persist()
            .await
            .context("failed to persist the sync ledger")?;

        let stats = match outcome {
            Ok(stats) => stats,
            Err(SyncError::Cancelled) => {
                formatter.warn("upload interrupted; completed files were recorded in the ledger");
                bail!("cancelled");
            }
            Err(e) => {
                formatter.error(&format!("upload stopped early: {e}"));
                formatter
                    .warn("files uploaded before the failure were recorded; re-run push to continue");
                return Ok(());
            }
        };

        // Step 5: Display results
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if matches!(format, OutputFormat::Json) {
            let json = serde_json::json!({
                "created": stats.created,
                "updated": stats.updated,
                "skipped": stats.skipped,
                "duration_ms": elapsed_ms,
            });
            formatter.print_json(&json);
        } else {
            let duration_display = if elapsed_ms >= 1000 {
                format!("{:.1}s", elapsed_ms as f64 / 1000.0)
            } else {
                format!("{elapsed_ms}ms")
            };

            if stats.created == 0 && stats.updated == 0 {
                formatter.success("Already up to date");
            } else {
                formatter.success(&format!("Push completed in {duration_display}"));
            }

            if stats.created > 0 {
                formatter.info(&format!(
                    "Created: {} file{}",
                    stats.created,
                    if stats.created == 1 { "" } else { "s" }
                ));
            }
            if stats.updated > 0 {
                formatter.info(&format!(
                    "Updated: {} file{}",
                    stats.updated,
                    if stats.updated == 1 { "" } else { "s" }
                ));
            }
            if stats.skipped > 0 {
                formatter.info(&format!(
                    "Skipped: {} file{}",
                    stats.skipped,
                    if stats.skipped == 1 { "" } else { "s" }
                ));
            }
        }

        Ok(())
    }
}

/// Walk `root` and return every regular file as a ledger-keyed relative path.
///
/// Hidden entries (dot-prefixed) are skipped, as are symlinks and names that
/// are not valid UTF-8. The result is sorted for a stable upload order.
fn collect_files(root: &Path) -> Result<Vec<RelPath>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("failed to read directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read directory {}", dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(path = %entry.path().display(), "Skipping non-UTF-8 file name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry
                .file_type()
                .with_context(|| format!("failed to stat {}", entry.path().display()))?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(root)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                match RelPath::new(rel) {
                    Ok(rel) => found.push(rel),
                    Err(e) => warn!(error = %e, "Skipping file with unrepresentable path"),
                }
            }
        }
    }

    found.sort();
    Ok(found)
}
