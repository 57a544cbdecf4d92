//! Read models returned by the conversation REST API.
//!
//! These mirror the backend's JSON. Unknown fields are ignored so the
//! client keeps working when the server adds columns.

use serde::{Deserialize, Serialize};

use super::{HistoryMessage, Sender};
use crate::domain::foundation::{ConversationId, Timestamp, ValidationError};

/// Server-side lifecycle of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationStatus {
    Active,
    Ended,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Ended => "ENDED",
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "ENDED" => Ok(Self::Ended),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("expected ACTIVE or ENDED, got '{}'", other),
            )),
        }
    }
}

/// Response of the create-conversation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedConversation {
    pub id: ConversationId,
}

/// Full conversation with its message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDetail {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    pub status: ConversationStatus,
    pub start_timestamp: Timestamp,
    #[serde(default)]
    pub end_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Seconds between start and end (or now, while active).
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

impl ConversationDetail {
    /// Title for display, falling back to the numbered placeholder.
    pub fn display_title(&self) -> String {
        display_title(self.id, self.title.as_deref())
    }
}

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    pub status: ConversationStatus,
    pub start_timestamp: Timestamp,
    #[serde(default)]
    pub end_timestamp: Option<Timestamp>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub duration: f64,
}

impl ConversationSummary {
    pub fn display_title(&self) -> String {
        display_title(self.id, self.title.as_deref())
    }
}

/// Response of the end-conversation call.
///
/// Only the summary matters to the session; the rest is informational.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EndedConversation {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<ConversationStatus>,
}

/// Filters for listing conversations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationFilter {
    /// `None` lists every status.
    pub status: Option<ConversationStatus>,
    /// Case-insensitive title search.
    pub search: Option<String>,
}

impl ConversationFilter {
    pub fn with_status(mut self, status: ConversationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Query string pairs, skipping unset and blank filters.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                pairs.push(("search", search.to_string()));
            }
        }
        pairs
    }
}

/// Natural-language question about past conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationQuery {
    pub query: String,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConversationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<Timestamp>,
}

impl ConversationQuery {
    pub const DEFAULT_MAX_RESULTS: u32 = 5;

    /// Builds a query, rejecting blank questions.
    pub fn new(query: impl Into<String>) -> Result<Self, ValidationError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(ValidationError::empty_field("query"));
        }
        Ok(Self {
            query,
            max_results: Self::DEFAULT_MAX_RESULTS,
            status: None,
            date_from: None,
            date_to: None,
        })
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_status(mut self, status: ConversationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn between(mut self, from: Option<Timestamp>, to: Option<Timestamp>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }
}

/// Answer to a [`ConversationQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    #[serde(default)]
    pub relevant_excerpts: Vec<Excerpt>,
    #[serde(default)]
    pub related_conversations: Vec<RelatedConversation>,
}

/// A message fragment the backend judged relevant to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Excerpt {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub conversation_title: Option<String>,
    pub content: String,
    pub sender: Sender,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// A conversation the backend used to answer a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedConversation {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start_timestamp: Option<Timestamp>,
}

fn display_title(id: ConversationId, title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => format!("Conversation {}", id),
    }
}

/// Compact duration label: `"42s"`, `"3m"`, `"2h"`.
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        format!("{}s", seconds.round() as u64)
    } else if seconds < 3600.0 {
        format!("{}m", (seconds / 60.0).round() as u64)
    } else {
        format!("{}h", (seconds / 3600.0).round() as u64)
    }
}
