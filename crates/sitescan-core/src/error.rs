//! Core error types for the scanning engine.
//!
//! This module defines the central error type shared by every crate and the
//! configuration-specific errors.

use thiserror::Error;

/// Central error type for scanning operations.
#[derive(Error, Debug)]
pub enum SiteScanError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database errors (connection, queries, migrations)
    #[error("database error: {0}")]
    Database(String),

    /// Browser automation errors (launch, navigation, evaluation)
    #[error("browser error: {0}")]
    Browser(String),

    /// Network errors (HTTP requests, DNS)
    #[error("network error: {0}")]
    Network(String),

    /// Queue errors (enqueue, dequeue, acknowledgement)
    #[error("queue error: {0}")]
    Queue(String),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `SiteScanError`.
pub type Result<T> = std::result::Result<T, SiteScanError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
