//! Conversation API port - REST operations the client consumes.
//!
//! Stateless: every call is independent and carries everything it needs.
//! The session controller only uses create / get / end; the history views
//! use list and query.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::conversation::{
    ConversationDetail, ConversationFilter, ConversationQuery, ConversationSummary,
    EndedConversation, QueryAnswer,
};
use crate::domain::foundation::ConversationId;

/// Port for the backend's conversation resource.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Creates an empty conversation and returns its identifier.
    async fn create_conversation(&self) -> Result<ConversationId, ApiError>;

    /// Fetches a conversation with its full message history.
    async fn get_conversation(&self, id: ConversationId) -> Result<ConversationDetail, ApiError>;

    /// Ends a conversation; the server may attach a generated summary.
    async fn end_conversation(&self, id: ConversationId) -> Result<EndedConversation, ApiError>;

    /// Lists conversations matching the filter.
    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<ConversationSummary>, ApiError>;

    /// Asks the backend a question about past conversations.
    async fn query_conversations(&self, query: &ConversationQuery) -> Result<QueryAnswer, ApiError>;
}

/// Errors from the conversation API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Conversation not found")]
    NotFound,

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn network(message: impl Into<String>) -> Self {
        ApiError::Network(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ApiError::Decode(message.into())
    }

    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout { .. } => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::NotFound | ApiError::Decode(_) => false,
        }
    }
}
