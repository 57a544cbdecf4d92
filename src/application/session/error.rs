//! Session error types.

use thiserror::Error;

use crate::ports::{ApiError, ChannelError, ProtocolError};

/// Errors surfaced by the session controller.
///
/// None of these are fatal: the session stays usable and the user can
/// retry, start over or load another conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Could not start a conversation: {0}")]
    Creation(ApiError),

    #[error("Could not end the conversation: {0}")]
    End(ApiError),

    #[error("Could not load the conversation: {0}")]
    Load(ApiError),

    #[error("Could not send message: {0}")]
    Channel(#[from] ChannelError),

    #[error("Ignored unexpected message from the assistant: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("No active conversation")]
    NoActiveConversation,

    #[error("Conversation has ended; start a new one")]
    ConversationEnded,

    #[error("Superseded by a newer session action")]
    Superseded,

    #[error("Session controller has stopped")]
    ControllerStopped,
}

impl SessionError {
    /// True when the caller's action was cancelled rather than failed.
    pub fn is_superseded(&self) -> bool {
        matches!(self, SessionError::Superseded)
    }
}
