//! Error types and Result aliases for p4wire

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for p4wire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for p4wire
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // === Transport errors ===
    /// The client executable could not be started
    #[error("Failed to spawn command '{command}': {reason}")]
    Transport { command: String, reason: String },

    /// Writing the stdin payload failed
    #[error("Failed to write input for command '{command}': {reason}")]
    InputWriteFailed { command: String, reason: String },

    // === Protocol errors ===
    /// The server answered with an error line, a non-zero exit code, or nothing at all
    #[error("Command '{command}' failed (exit code {exit_code}): {message}")]
    Protocol {
        command: String,
        message: String,
        exit_code: i32,
    },

    /// A `-i` save round trip was rejected by the server
    #[error("Failed to save using '{command}': {message}\n--- input ---\n{input}")]
    SaveFailed {
        command: String,
        message: String,
        input: String,
    },

    /// Command did not finish before its deadline
    #[error("Command '{command}' timed out after {duration:?} (process still running: {still_running})")]
    Timeout {
        command: String,
        duration: Duration,
        still_running: bool,
    },

    /// Command was cancelled from another thread
    #[error("Command '{command}' was cancelled")]
    Cancelled { command: String },

    /// Command has no arguments
    #[error("Command cannot be empty")]
    EmptyCommand,

    // === Authentication errors ===
    /// Login was attempted and failed, or the retried command was rejected again
    #[error("Authentication failed for user '{user}': {reason}")]
    AuthenticationFailed { user: String, reason: String },

    /// The server refused the user because of licensing; never retried
    #[error("User '{user}' is over the license quota: {message}")]
    LicenseQuota { user: String, message: String },

    // === Query errors ===
    /// Oversized listing could not be split further
    #[error("Cannot partition query on '{path}' (depth {depth}): {reason}")]
    PartitionLimit {
        path: String,
        depth: usize,
        reason: String,
    },

    // === Configuration errors ===
    /// Failed to load configuration file
    #[error("Failed to load config from '{}': {reason}", path.display())]
    ConfigLoadFailed { path: PathBuf, reason: String },

    /// Configuration file not found
    #[error("Configuration file not found")]
    ConfigNotFound,

    /// Configuration validation failed
    #[error("Configuration validation failed for '{field}': {reason}")]
    ConfigValidationFailed { field: String, reason: String },

    /// Failed to parse configuration
    #[error("Failed to parse {format} config: {reason}")]
    ConfigParseFailed { format: String, reason: String },

    /// Failed to serialize configuration
    #[error("Failed to serialize config as {format}: {reason}")]
    ConfigSerializationFailed { format: String, reason: String },

    // === I/O and serialization errors ===
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Regex compilation errors
    #[error("Regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Server-side error text carried by this error, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Error::Protocol { message, .. } | Error::SaveFailed { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether the failure happened before the server could answer
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::InputWriteFailed { .. }
        )
    }
}
