//! Domain layer containing the client's core types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (identifiers, timestamps, state machine trait, errors)
//! - `conversation` - Chat turns, message store, session phases and API read models

pub mod conversation;
pub mod foundation;
