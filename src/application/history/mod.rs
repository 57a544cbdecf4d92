//! History handlers - read-only views over past conversations.
//!
//! Fetch-once queries for the dashboard list, the detail view and the
//! natural-language search. None of them touch live session state.

mod get_conversation_detail;
mod list_conversations;
mod query_conversations;

pub use get_conversation_detail::{
    GetConversationDetailHandler, GetConversationDetailQuery, GetConversationDetailResult,
};
pub use list_conversations::{
    ListConversationsHandler, ListConversationsQuery, ListConversationsResult, StatusFilter,
};
pub use query_conversations::{
    QueryConversationsHandler, QueryConversationsQuery, QueryConversationsResult,
};

use thiserror::Error;

use crate::domain::foundation::ValidationError;
use crate::ports::ApiError;

/// Errors from history handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Invalid request: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
