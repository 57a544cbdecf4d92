//! Application layer - the live session and history queries.
//!
//! `session` owns mutable conversation state behind an actor; `history`
//! holds stateless query handlers for browsing past conversations.

pub mod history;
pub mod session;

pub use history::{
    GetConversationDetailHandler, GetConversationDetailQuery, HistoryError,
    ListConversationsHandler, ListConversationsQuery, QueryConversationsHandler,
    QueryConversationsQuery, StatusFilter,
};
pub use session::{SendOutcome, SessionController, SessionError, SessionHandle, SessionSnapshot};
