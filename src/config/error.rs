//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("API base URL must start with http:// or https://")]
    InvalidApiUrl,

    #[error("WebSocket base URL must start with ws:// or wss://")]
    InvalidWebSocketUrl,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Initial backoff must be positive and not exceed max backoff")]
    InvalidBackoff,

    #[error("Backoff multiplier must be at least 1.0")]
    InvalidBackoffMultiplier,

    #[error("Outbound queue capacity must be between 1 and 4096")]
    InvalidQueueCapacity,

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
