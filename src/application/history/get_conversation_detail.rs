//! GetConversationDetailHandler - Query handler for one conversation's history.

use std::sync::Arc;

use super::HistoryError;
use crate::domain::conversation::ConversationDetail;
use crate::domain::foundation::ConversationId;
use crate::ports::ConversationApi;

/// Query for a conversation with its full message history and summary.
#[derive(Debug, Clone)]
pub struct GetConversationDetailQuery {
    pub conversation_id: ConversationId,
}

pub type GetConversationDetailResult = ConversationDetail;

/// Handler for the conversation detail view.
pub struct GetConversationDetailHandler {
    api: Arc<dyn ConversationApi>,
}

impl GetConversationDetailHandler {
    pub fn new(api: Arc<dyn ConversationApi>) -> Self {
        Self { api }
    }

    pub async fn handle(
        &self,
        query: GetConversationDetailQuery,
    ) -> Result<GetConversationDetailResult, HistoryError> {
        let detail = self.api.get_conversation(query.conversation_id).await?;
        tracing::debug!(
            conversation_id = %detail.id,
            messages = detail.messages.len(),
            "Fetched conversation detail"
        );
        Ok(detail)
    }
}
