//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `PARLEY` prefix and nested values use double underscores as separators.
//! Every section has development defaults pointing at a local backend.
//!
//! # Example
//!
//! ```no_run
//! use parley::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Talking to {}", config.backend.api_base());
//! ```

mod backend;
mod error;
mod logging;
mod realtime;

pub use backend::BackendConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use realtime::RealtimeConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// REST and WebSocket endpoints
    #[serde(default)]
    pub backend: BackendConfig,

    /// Reconnect backoff and outbound queueing
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Tracing output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Reads `.env` (when present) and then `PARLEY__*` variables.
    ///
    /// Nesting follows the struct layout, one `__` per level:
    /// `PARLEY__BACKEND__API_BASE_URL` sets `backend.api_base_url` and
    /// `PARLEY__REALTIME__MAX_BACKOFF_MS` sets `realtime.max_backoff_ms`.
    /// Anything unset keeps its development default.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PARLEY")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Checks each section in turn and reports the first problem.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.backend.validate()?;
        self.realtime.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
