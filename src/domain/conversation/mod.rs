//! Conversation domain module.
//!
//! Chat turns, the message store, the session phase machine, connection
//! health and the read models of the REST API.

mod connection;
mod message;
mod phase;
mod records;
mod store;

pub use connection::ConnectionStatus;
pub use message::{ChatMessage, HistoryMessage, Sender};
pub use phase::SessionPhase;
pub use records::{
    format_duration, ConversationDetail, ConversationFilter, ConversationQuery,
    ConversationStatus, ConversationSummary, CreatedConversation, EndedConversation, Excerpt,
    QueryAnswer, RelatedConversation,
};
pub use store::MessageStore;
