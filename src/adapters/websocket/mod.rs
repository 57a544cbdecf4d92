//! WebSocket adapter for the realtime channel port.
//!
//! ```text
//!   ChannelHandle ──frames──▶ Transport task ──Text──▶ ws://…/ws/chat/{id}/
//!                 ◀─payloads─                ◀─Text───
//! ```
//!
//! The transport reconnects with exponential backoff (see
//! [`RealtimeConfig`](crate::config::RealtimeConfig)) and only drains the
//! outbound queue while the socket is open.

mod connector;

pub use connector::WebSocketConnector;
