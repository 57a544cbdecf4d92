//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the session core and the outside world. Adapters implement these ports.
//!
//! - `ConversationApi` - REST operations on the conversation resource
//! - `RealtimeConnector` / `ChannelHandle` - per-conversation realtime channel
//!   and its wire frames

mod conversation_api;
mod realtime_channel;

pub use conversation_api::{ApiError, ConversationApi};
pub use realtime_channel::{
    ChannelEndpoint, ChannelError, ChannelEvent, ChannelHandle, InboundFrame, OutboundFrame,
    ProtocolError, RealtimeConnector, ShutdownSignal,
};
