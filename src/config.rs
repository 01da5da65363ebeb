//! Configuration System
//!
//! Layered engine configuration: built-in defaults, the user-level file, workspace files
//! and `TRELLIS__*` environment variables, in increasing precedence.

use crate::error::EngineError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Fetch orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// How long a reused in-flight resource may stay pending before it is returned anyway
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    /// Age after which unrelated chains are aborted when a primary fetch hits the cache
    #[serde(default = "default_stale_chain_after_ms")]
    pub stale_chain_after_ms: u64,
}

fn default_ready_timeout_ms() -> u64 {
    5_000
}

fn default_stale_chain_after_ms() -> u64 {
    1_000
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: default_ready_timeout_ms(),
            stale_chain_after_ms: default_stale_chain_after_ms(),
        }
    }
}

impl FetchConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn stale_chain_after(&self) -> Duration {
        Duration::from_millis(self.stale_chain_after_ms)
    }
}

/// Push reconciliation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Discard every push message when false
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Api(String),
    Fetch(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Api(msg) => write!(f, "api: {}", msg),
            ValidationError::Fetch(msg) => write!(f, "fetch: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl EngineConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            errors.push(ValidationError::Api(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.api.request_timeout_ms == 0 {
            errors.push(ValidationError::Api(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.fetch.ready_timeout_ms == 0 {
            errors.push(ValidationError::Fetch(
                "ready_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Render as TOML, for `trellis config`
    pub fn to_toml(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::ConfigError(format!("Failed to render config: {}", e)))
    }
}

/// Loads [`EngineConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, user file, workspace files, then environment.
    pub fn load(workspace_root: &Path) -> Result<EngineConfig, EngineError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Load defaults, one explicit file, then environment.
    pub fn load_from_file(path: &Path) -> Result<EngineConfig, EngineError> {
        if !path.exists() {
            return Err(EngineError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path.to_path_buf()));
        let builder = sources::environment::add_to_builder(builder);
        Self::finish(builder)
    }

    /// Path of the workspace base config file
    pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join("config").join("config.toml")
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<EngineConfig, EngineError> {
        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            EngineError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        Ok(config)
    }
}
