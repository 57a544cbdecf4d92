//! Realtime connection health as seen by the session.

use serde::{Deserialize, Serialize};

/// Health of the realtime channel bound to the current conversation.
///
/// A change of status never changes which conversation the channel is
/// bound to. Only an explicit switch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Reconnecting,
}

impl ConnectionStatus {
    /// True when frames written now reach the server without queueing.
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Short label for a connectivity indicator.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "offline",
            Self::Connecting => "connecting",
            Self::Open => "online",
            Self::Reconnecting => "reconnecting",
        }
    }
}
