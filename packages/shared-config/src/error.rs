//! Configuration error types

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid value for environment variable
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    /// Configuration validation error
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
