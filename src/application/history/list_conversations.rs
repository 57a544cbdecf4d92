//! ListConversationsHandler - Query handler for the conversation list.

use std::str::FromStr;
use std::sync::Arc;

use super::HistoryError;
use crate::domain::conversation::{ConversationFilter, ConversationStatus, ConversationSummary};
use crate::domain::foundation::ValidationError;
use crate::ports::ConversationApi;

/// Status filter as offered by the list view: `all`, `ACTIVE` or `ENDED`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ConversationStatus),
}

impl StatusFilter {
    fn status(&self) -> Option<ConversationStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(*status),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        ConversationStatus::from_str(trimmed).map(StatusFilter::Only)
    }
}

/// Query to list conversations.
#[derive(Debug, Clone, Default)]
pub struct ListConversationsQuery {
    pub status: StatusFilter,
    /// Title search; blank means no search.
    pub search: Option<String>,
}

/// Conversations, newest first as returned by the backend.
pub type ListConversationsResult = Vec<ConversationSummary>;

/// Handler for listing conversations.
pub struct ListConversationsHandler {
    api: Arc<dyn ConversationApi>,
}

impl ListConversationsHandler {
    pub fn new(api: Arc<dyn ConversationApi>) -> Self {
        Self { api }
    }

    pub async fn handle(
        &self,
        query: ListConversationsQuery,
    ) -> Result<ListConversationsResult, HistoryError> {
        let mut filter = ConversationFilter::default();
        if let Some(status) = query.status.status() {
            filter = filter.with_status(status);
        }
        if let Some(search) = query.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                filter = filter.with_search(search);
            }
        }

        let conversations = self.api.list_conversations(&filter).await?;
        tracing::debug!(count = conversations.len(), "Listed conversations");
        Ok(conversations)
    }
}
