//! Configuration loading, validation, and management for DeskClaw.
//!
//! Loads configuration from `~/.deskclaw/config.toml` with environment
//! variable overrides for the endpoint settings. Validates all settings at
//! load time. Configuration is immutable once handed to the runtime:
//! changing it means constructing new loop/runner instances.

use deskclaw_core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deskclaw/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model endpoint settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Sandbox policy for file tools
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Retry policy for the task runner
    #[serde(default)]
    pub retry: RetrySettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("sandbox", &self.sandbox)
            .field("agent", &self.agent)
            .field("retry", &self.retry)
            .field("logging", &self.logging)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible endpoint base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key; also settable via `DESKCLAW_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// The sandbox root; relative paths resolve against the process cwd
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    /// Allowed file extensions for tool access
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<String>,

    /// Per-file byte limit for reads and writes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_working_directory() -> PathBuf {
    ".".into()
}
fn default_allowed_formats() -> Vec<String> {
    [
        ".txt", ".md", ".py", ".js", ".json", ".yaml", ".yml", ".html", ".css", ".xml", ".csv",
        ".log", ".sh", ".bat", ".rs", ".toml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            working_directory: default_working_directory(),
            allowed_formats: default_allowed_formats(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum tool-call round-trips per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per submission, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit in seconds
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_secs() -> u64 {
    2
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g., "info", "deskclaw_agent=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// The default config file location: `~/.deskclaw/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs_home()
            .map(|home| home.join(".deskclaw").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("deskclaw.toml"))
    }

    /// Load from a TOML file, apply env overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config: AppConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path if it exists, otherwise start from
    /// defaults. Env overrides and validation apply either way.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Environment variables take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("DESKCLAW_API_KEY")
            && !key.is_empty()
        {
            self.model.api_key = Some(key);
        }
        if let Ok(base) = std::env::var("DESKCLAW_API_BASE")
            && !base.is_empty()
        {
            self.model.api_base = base;
        }
        if let Ok(model) = std::env::var("DESKCLAW_MODEL")
            && !model.is_empty()
        {
            self.model.model = model;
        }
    }

    /// Check the configuration for values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.api_base.is_empty() {
            return Err(ConfigError::Invalid("model.api_base must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be between 0.0 and 2.0 (got {})",
                self.model.temperature
            )));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.sandbox.max_file_size == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.max_file_size must be at least 1 byte".into(),
            ));
        }
        if self.sandbox.allowed_formats.is_empty() {
            return Err(ConfigError::Invalid(
                "sandbox.allowed_formats must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Write the configuration back out as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(path, toml).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn dirs_home() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";

    std::env::var_os(var).map(PathBuf::from)
}
