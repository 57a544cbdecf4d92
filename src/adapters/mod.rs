//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the session to the backend:
//! - `rest` - reqwest client for the conversation REST API
//! - `websocket` - tokio-tungstenite realtime channel with reconnect
//! - `memory` - deterministic in-memory fakes for tests

pub mod memory;
pub mod rest;
pub mod websocket;

pub use memory::{InMemoryConnector, InMemoryConversationApi};
pub use rest::HttpConversationApi;
pub use websocket::WebSocketConnector;
