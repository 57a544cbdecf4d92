//! REST adapters for the conversation resource.

mod conversation_client;

pub use conversation_client::HttpConversationApi;
