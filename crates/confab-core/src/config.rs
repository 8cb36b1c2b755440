//! Configuration module for Confab.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, defaults, and a builder pattern for
//! programmatic use.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::newtypes::RemoteId;
use crate::domain::policy::ConflictPolicy;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Confab.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,
    pub auth: AuthConfig,
    pub sync: SyncConfig,
}

/// Remote destination settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// ID of the remote folder that roots the mirrored tree.
    /// `None` until the user configures a destination.
    pub root_folder_id: Option<String>,
}

/// Credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Which credential flow to use: `service` or `user`.
    pub mode: AuthMode,
    /// Path to the credential file (service key JSON, or client-id/secret
    /// JSON for the user flow).
    pub credentials_path: PathBuf,
    /// Where the user-flow token cache is stored (0600).
    pub token_cache_path: PathBuf,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Policy applied when local and remote content have diverged.
    pub conflict_policy: ConflictPolicy,
    /// Session directory holding the sync ledger (`sync-state.json`).
    pub session_dir: PathBuf,
}

/// Credential flow selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Signed-assertion flow using a service key file
    #[default]
    Service,
    /// User-delegated flow with a cached/refreshable token
    User,
}

impl AuthMode {
    /// The literal used in configuration and CLI flags
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::User => "user",
        }
    }
}

impl Display for AuthMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(Self::Service),
            "user" => Ok(Self::User),
            other => Err(DomainError::Auth(format!(
                "unknown credential mode {other:?}; expected service or user"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and saving
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/confab/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("confab")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config and RemoteConfig derive Default because all their fields
// implement Default.

impl Default for AuthConfig {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("confab");
        Self {
            mode: AuthMode::Service,
            credentials_path: config_dir.join("credentials.json"),
            token_cache_path: config_dir.join("token.json"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::LocalWins,
            session_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("confab"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"remote.root_folder_id"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. An unset
    /// `remote.root_folder_id` is not an error here (the config may still
    /// be in setup), but a present-and-malformed one is.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- remote ---
        if let Some(root) = &self.remote.root_folder_id {
            if let Err(e) = RemoteId::new(root.clone()) {
                errors.push(ValidationError {
                    field: "remote.root_folder_id".into(),
                    message: e.to_string(),
                });
            }
        }

        // --- auth ---
        if self.auth.credentials_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "auth.credentials_path".into(),
                message: "must not be empty".into(),
            });
        }
        if self.auth.mode == AuthMode::User && self.auth.token_cache_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "auth.token_cache_path".into(),
                message: "required when auth.mode is user".into(),
            });
        }

        // --- sync ---
        if self.sync.session_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.session_dir".into(),
                message: "must not be empty".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Tilde expansion
// ---------------------------------------------------------------------------

/// Expand a leading `~` or `~/` to the user's home directory.
///
/// Paths without a tilde prefix are returned unchanged. Used on the four
/// path fields before they are handed to the engine or adapters.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`Config`], used by tests and CLI overrides.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // -- remote --

    pub fn remote_root_folder_id(mut self, id: impl Into<String>) -> Self {
        self.config.remote.root_folder_id = Some(id.into());
        self
    }

    // -- auth --

    pub fn auth_mode(mut self, mode: AuthMode) -> Self {
        self.config.auth.mode = mode;
        self
    }

    pub fn auth_credentials_path(mut self, path: PathBuf) -> Self {
        self.config.auth.credentials_path = path;
        self
    }

    pub fn auth_token_cache_path(mut self, path: PathBuf) -> Self {
        self.config.auth.token_cache_path = path;
        self
    }

    // -- sync --

    pub fn sync_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.config.sync.conflict_policy = policy;
        self
    }

    pub fn sync_session_dir(mut self, dir: PathBuf) -> Self {
        self.config.sync.session_dir = dir;
        self
    }

    /// Build the configuration without validating.
    pub fn build(self) -> Config {
        self.config
    }

    /// Build the configuration, returning all validation errors if any.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
