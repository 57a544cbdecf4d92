//! QueryConversationsHandler - Natural-language search over past conversations.

use std::sync::Arc;

use super::HistoryError;
use crate::domain::conversation::{ConversationQuery, ConversationStatus, QueryAnswer};
use crate::domain::foundation::Timestamp;
use crate::ports::ConversationApi;

/// Question plus optional narrowing filters.
#[derive(Debug, Clone, Default)]
pub struct QueryConversationsQuery {
    pub question: String,
    /// Defaults to [`ConversationQuery::DEFAULT_MAX_RESULTS`].
    pub max_results: Option<u32>,
    pub status: Option<ConversationStatus>,
    pub date_from: Option<Timestamp>,
    pub date_to: Option<Timestamp>,
}

pub type QueryConversationsResult = QueryAnswer;

/// Handler for the intelligence view.
///
/// Blank questions are rejected before any request is made.
pub struct QueryConversationsHandler {
    api: Arc<dyn ConversationApi>,
}

impl QueryConversationsHandler {
    pub fn new(api: Arc<dyn ConversationApi>) -> Self {
        Self { api }
    }

    pub async fn handle(
        &self,
        query: QueryConversationsQuery,
    ) -> Result<QueryConversationsResult, HistoryError> {
        let mut request = ConversationQuery::new(query.question.trim())?;
        if let Some(max_results) = query.max_results {
            request = request.with_max_results(max_results);
        }
        if let Some(status) = query.status {
            request = request.with_status(status);
        }
        request = request.between(query.date_from, query.date_to);

        let answer = self.api.query_conversations(&request).await?;
        tracing::debug!(
            excerpts = answer.relevant_excerpts.len(),
            related = answer.related_conversations.len(),
            "Conversation query answered"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryConversationApi, JournalEntry};
    use crate::domain::conversation::ChatMessage;
    use crate::domain::foundation::ValidationError;

    #[tokio::test]
    async fn blank_question_is_rejected_without_a_request() {
        let api = Arc::new(InMemoryConversationApi::new());
        let handler = QueryConversationsHandler::new(api.clone());

        let err = handler
            .handle(QueryConversationsQuery {
                question: "   ".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err, HistoryError::Invalid(ValidationError::empty_field("query")));
        assert!(api.journal().entries().is_empty());
    }

    #[tokio::test]
    async fn question_is_trimmed_and_answered() {
        let api = Arc::new(InMemoryConversationApi::new());
        let id = api.seed(Some("Pets"), vec![ChatMessage::user("My cat sleeps all day")]);
        let handler = QueryConversationsHandler::new(api.clone());

        let answer = handler
            .handle(QueryConversationsQuery {
                question: "  sleepy cat ".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            api.journal().entries(),
            vec![JournalEntry::Queried("sleepy cat".to_string())]
        );
        assert_eq!(answer.related_conversations[0].id, id);
    }

    #[tokio::test]
    async fn max_results_limits_related_conversations() {
        let api = Arc::new(InMemoryConversationApi::new());
        for _ in 0..4 {
            api.seed(None, vec![ChatMessage::user("budget review")]);
        }
        let handler = QueryConversationsHandler::new(api);

        let answer = handler
            .handle(QueryConversationsQuery {
                question: "budget".to_string(),
                max_results: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(answer.related_conversations.len(), 2);
        assert_eq!(answer.relevant_excerpts.len(), 4);
    }
}
