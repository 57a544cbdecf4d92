//! Parley - conversation session client for a chat assistant backend.
//!
//! Talks to a backend that exposes conversations over REST and streams
//! assistant replies over one WebSocket per conversation. The crate keeps
//! a local session consistent with the server: it creates conversations
//! lazily, only transmits once the realtime channel is ready, and never
//! lets a stale network result or an old channel leak into the current
//! conversation.
//!
//! Layout follows ports and adapters:
//! - `domain` - value objects, the message store and the session phase machine
//! - `ports` - the conversation API and realtime channel seams
//! - `adapters` - reqwest, tokio-tungstenite and in-memory implementations
//! - `application` - the session controller and history query handlers
//! - `config` - environment-driven configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
