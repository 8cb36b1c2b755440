//! Config command - view and scaffold the Confab configuration
//!
//! Provides the `confab config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON), with validation notes
//! 2. Writes a starter configuration file for new installations

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Write a starter configuration file
    Init,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(format, config_path).await,
            ConfigCommand::Init => self.execute_init(format, config_path).await,
        }
    }

    /// Show the current configuration, falling back to defaults when the
    /// file is missing or unreadable.
    async fn execute_show(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        use confab_core::config::Config;

        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        let config = Config::load_or_default(config_path);

        info!(config_path = %config_path.display(), "Showing configuration");

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::to_value(&config)
                .context("failed to serialize the configuration")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("failed to serialize the configuration")?;
            for line in yaml.lines() {
                formatter.info(line);
            }

            let errors = config.validate();
            if !errors.is_empty() {
                formatter.info("");
                formatter.warn(&format!(
                    "{} validation issue{}:",
                    errors.len(),
                    if errors.len() == 1 { "" } else { "s" }
                ));
                for error in &errors {
                    formatter.info(&format!("  {error}"));
                }
            }
        }

        Ok(())
    }

    /// Scaffold a default configuration file. An existing file is never
    /// overwritten.
    async fn execute_init(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        use confab_core::config::Config;

        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        if config_path.exists() {
            formatter.warn(&format!(
                "Configuration already exists at {}",
                config_path.display()
            ));
            formatter.info("Edit it directly, or delete it and re-run 'confab config init'.");
            return Ok(());
        }

        let config = Config::default();
        config
            .save(config_path)
            .with_context(|| format!("failed to write {}", config_path.display()))?;

        info!(config_path = %config_path.display(), "Configuration scaffolded");

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::json!({
                "created": true,
                "config_path": config_path.display().to_string(),
            });
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Wrote {}", config_path.display()));
            formatter.info("Set remote.root_folder_id to the destination folder id,");
            formatter.info("then run 'confab auth login'.");
        }

        Ok(())
    }
}
