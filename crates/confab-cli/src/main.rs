//! Confab CLI - command-line interface for the Confab replication engine
//!
//! Provides commands for:
//! - Priming and inspecting Drive credentials
//! - Pushing local artifact trees into the configured remote folder
//! - Verifying the sync ledger against the live remote listing
//! - Viewing and scaffolding configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth::AuthCommand, config::ConfigCommand, push::PushCommand, verify::VerifyCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "confab",
    version,
    about = "Meeting-artifact replication to Google Drive"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Credential commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Upload local files into the configured remote folder
    Push(PushCommand),
    /// Reconcile the sync ledger against the remote listing
    Verify(VerifyCommand),
    /// View and scaffold configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Trips `token` on the first SIGINT or SIGTERM.
///
/// Long-running commands race their remote calls and backoff sleeps against
/// this token, so a Ctrl+C lands between files rather than mid-write.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let config_path = cli
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(confab_core::config::Config::default_path);

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(format, &config_path).await,
        Commands::Push(cmd) => {
            let cancel = CancellationToken::new();
            tokio::spawn(shutdown_signal(cancel.clone()));
            cmd.execute(format, &config_path, &cancel).await
        }
        Commands::Verify(cmd) => {
            let cancel = CancellationToken::new();
            tokio::spawn(shutdown_signal(cancel.clone()));
            cmd.execute(format, &config_path, &cancel).await
        }
        Commands::Config(cmd) => cmd.execute(format, &config_path).await,
    }
}
