//! In-memory conversation API for tests and offline demos.
//!
//! Behaves like the backend for the operations the client uses. Each
//! session-critical operation passes through a [`Gate`] so a test can hold
//! it mid-flight and decide when (and in which order) results arrive.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::journal::{Gate, Journal, JournalEntry};
use crate::domain::conversation::{
    ChatMessage, ConversationDetail, ConversationFilter, ConversationQuery, ConversationStatus,
    ConversationSummary, EndedConversation, Excerpt, HistoryMessage, QueryAnswer,
    RelatedConversation,
};
use crate::domain::foundation::{ConversationId, MessageId, Timestamp};
use crate::ports::{ApiError, ConversationApi};

const MAX_EXCERPTS: usize = 10;
const EXCERPT_CHARS: usize = 200;

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    Create,
    Fetch,
    End,
    List,
    Query,
}

struct ApiState {
    next_id: i64,
    next_message_id: i64,
    conversations: BTreeMap<ConversationId, ConversationDetail>,
    failures: HashMap<ApiOperation, VecDeque<ApiError>>,
    summary: Option<String>,
}

/// Deterministic [`ConversationApi`] backed by a map.
pub struct InMemoryConversationApi {
    state: Mutex<ApiState>,
    create_gate: Gate,
    fetch_gate: Gate,
    end_gate: Gate,
    journal: Journal,
}

impl InMemoryConversationApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ApiState {
                next_id: 1,
                next_message_id: 1,
                conversations: BTreeMap::new(),
                failures: HashMap::new(),
                summary: Some("The user and the assistant chatted.".to_string()),
            }),
            create_gate: Gate::new(),
            fetch_gate: Gate::new(),
            end_gate: Gate::new(),
            journal: Journal::new(),
        }
    }

    /// Identifier handed out by the next create call.
    pub fn with_next_id(self, id: i64) -> Self {
        self.lock().next_id = id;
        self
    }

    /// Summary returned by end calls.
    pub fn with_summary(self, summary: Option<&str>) -> Self {
        self.lock().summary = summary.map(str::to_string);
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn create_gate(&self) -> &Gate {
        &self.create_gate
    }

    pub fn fetch_gate(&self) -> &Gate {
        &self.fetch_gate
    }

    pub fn end_gate(&self) -> &Gate {
        &self.end_gate
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: ApiOperation, error: ApiError) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Stores a conversation with the given turns and returns its id.
    pub fn seed(&self, title: Option<&str>, messages: Vec<ChatMessage>) -> ConversationId {
        let mut state = self.lock();
        let id = ConversationId::new(state.next_id);
        state.next_id += 1;

        let start = Timestamp::now();
        let history = messages
            .into_iter()
            .map(|m| {
                let message_id = MessageId::new(state.next_message_id);
                state.next_message_id += 1;
                HistoryMessage {
                    id: message_id,
                    sender: m.sender,
                    content: m.content,
                    timestamp: start,
                }
            })
            .collect();

        state.conversations.insert(
            id,
            ConversationDetail {
                id,
                title: title.map(str::to_string),
                status: ConversationStatus::Active,
                start_timestamp: start,
                end_timestamp: None,
                summary: None,
                duration: 0.0,
                messages: history,
            },
        );
        id
    }

    pub fn conversation(&self, id: ConversationId) -> Option<ConversationDetail> {
        self.lock().conversations.get(&id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, ApiState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_failure(&self, operation: ApiOperation) -> Result<(), ApiError> {
        match self
            .lock()
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryConversationApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationApi for InMemoryConversationApi {
    async fn create_conversation(&self) -> Result<ConversationId, ApiError> {
        self.journal.record(JournalEntry::CreateRequested);
        self.create_gate.pass().await;
        self.take_failure(ApiOperation::Create)?;

        let id = self.seed(None, Vec::new());
        self.journal.record(JournalEntry::Created(id));
        Ok(id)
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<ConversationDetail, ApiError> {
        self.fetch_gate.pass().await;
        self.take_failure(ApiOperation::Fetch)?;

        let detail = self.conversation(id).ok_or(ApiError::NotFound)?;
        self.journal.record(JournalEntry::Fetched(id));
        Ok(detail)
    }

    async fn end_conversation(&self, id: ConversationId) -> Result<EndedConversation, ApiError> {
        self.end_gate.pass().await;
        self.take_failure(ApiOperation::End)?;

        let ended = {
            let mut state = self.lock();
            let summary = state.summary.clone();
            let detail = state.conversations.get_mut(&id).ok_or(ApiError::NotFound)?;

            let now = Timestamp::now();
            detail.status = ConversationStatus::Ended;
            detail.end_timestamp = Some(now);
            detail.summary = summary.clone();
            detail.duration = (*now.as_datetime() - *detail.start_timestamp.as_datetime())
                .num_milliseconds() as f64
                / 1000.0;

            EndedConversation {
                summary,
                status: Some(ConversationStatus::Ended),
            }
        };

        self.journal.record(JournalEntry::Ended(id));
        Ok(ended)
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        self.take_failure(ApiOperation::List)?;
        self.journal.record(JournalEntry::Listed);

        let search = filter
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let state = self.lock();
        let mut listed: Vec<ConversationSummary> = state
            .conversations
            .values()
            .filter(|c| filter.status.map_or(true, |status| c.status == status))
            .filter(|c| match &search {
                Some(needle) => c
                    .title
                    .as_deref()
                    .map_or(false, |t| t.to_lowercase().contains(needle)),
                None => true,
            })
            .map(|c| ConversationSummary {
                id: c.id,
                title: c.title.clone(),
                status: c.status,
                start_timestamp: c.start_timestamp,
                end_timestamp: c.end_timestamp,
                summary: c.summary.clone(),
                message_count: c.messages.len() as u64,
                duration: c.duration,
            })
            .collect();

        // Newest first, ties by id descending.
        listed.sort_by(|a, b| {
            b.start_timestamp
                .cmp(&a.start_timestamp)
                .then(b.id.cmp(&a.id))
        });
        Ok(listed)
    }

    async fn query_conversations(&self, query: &ConversationQuery) -> Result<QueryAnswer, ApiError> {
        self.take_failure(ApiOperation::Query)?;
        self.journal.record(JournalEntry::Queried(query.query.clone()));

        let terms: Vec<String> = query
            .query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .filter(|w| w.chars().count() > 2)
            .collect();

        let state = self.lock();
        let mut excerpts = Vec::new();
        let mut related = Vec::new();
        let mut seen = HashSet::new();

        let candidates = state
            .conversations
            .values()
            .filter(|c| query.status.map_or(true, |status| c.status == status))
            .filter(|c| query.date_from.map_or(true, |from| !c.start_timestamp.is_before(&from)))
            .filter(|c| query.date_to.map_or(true, |to| !to.is_before(&c.start_timestamp)));

        for conversation in candidates {
            for message in &conversation.messages {
                let content = message.content.to_lowercase();
                if !terms.iter().any(|t| content.contains(t.as_str())) {
                    continue;
                }

                if excerpts.len() < MAX_EXCERPTS {
                    excerpts.push(Excerpt {
                        conversation_id: conversation.id,
                        conversation_title: conversation.title.clone(),
                        content: message.content.chars().take(EXCERPT_CHARS).collect(),
                        sender: message.sender,
                        timestamp: Some(message.timestamp),
                    });
                }

                if related.len() < query.max_results as usize && seen.insert(conversation.id) {
                    related.push(RelatedConversation {
                        id: conversation.id,
                        title: conversation.title.clone(),
                        start_timestamp: Some(conversation.start_timestamp),
                    });
                }
            }
        }

        let answer = if excerpts.is_empty() {
            "No relevant conversations found.".to_string()
        } else {
            format!(
                "Found {} relevant messages across {} conversations.",
                excerpts.len(),
                related.len()
            )
        };

        Ok(QueryAnswer {
            answer,
            relevant_excerpts: excerpts,
            related_conversations: related,
        })
    }
}
