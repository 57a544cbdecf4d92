//! Backend endpoint configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::foundation::ConversationId;

/// Where the conversation REST API and realtime channel live.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the REST API (e.g. `http://localhost:8000/api`)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL of the per-conversation WebSocket route
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,

    /// REST request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// REST base without a trailing slash
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Channel address for a conversation: `{ws_base_url}/{id}/`
    pub fn channel_url(&self, conversation_id: ConversationId) -> String {
        format!(
            "{}/{}/",
            self.ws_base_url.trim_end_matches('/'),
            conversation_id
        )
    }

    /// Validate backend configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(ValidationError::InvalidApiUrl);
        }
        if !(self.ws_base_url.starts_with("ws://") || self.ws_base_url.starts_with("wss://")) {
            return Err(ValidationError::InvalidWebSocketUrl);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            ws_base_url: default_ws_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_ws_base_url() -> String {
    "ws://localhost:8000/ws/chat".to_string()
}

fn default_request_timeout() -> u64 {
    30
}
