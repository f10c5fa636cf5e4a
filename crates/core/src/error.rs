//! Error types for the DeskClaw domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The taxonomy follows
//! the recovery boundary: tool errors are folded back into the conversation
//! so the model can react; transport errors abort the run and are retried
//! by the task runner; `Cancelled` is terminal and never retried.

use thiserror::Error;

/// The top-level error type for a single agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model transport failed mid-run. This is the unit of retry.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The run was cancelled cooperatively. Never retried.
    #[error("Run cancelled")]
    Cancelled,

    /// All retry attempts were exhausted. Carries the last underlying cause.
    #[error("Run failed after {attempts} attempts: {last}")]
    AttemptsExhausted {
        attempts: u32,
        last: TransportError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our AgentError.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised by the model transport. These exit the agent loop
/// (`Failed` state) and are subject to runner retry.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

/// Errors raised by tool validation or dispatch.
///
/// These never abort the loop: the loop renders them as a tool-role message
/// so the model can correct itself or apologize.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Path '{path}' escapes the sandbox root")]
    PathEscape { path: String },

    #[error("Unsupported file format '{extension}' (allowed: {allowed})")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Content to replace was not found in '{path}'")]
    ContentNotFound { path: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
