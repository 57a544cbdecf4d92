//! In-memory adapters.
//!
//! Deterministic stand-ins for the backend used by unit tests and the
//! session controller's property tests. A shared [`Journal`] records the
//! cross-adapter order of calls; [`Gate`]s hold operations mid-flight.

mod connector;
mod conversation_api;
mod journal;

pub use connector::{FakeChannel, InMemoryConnector};
pub use conversation_api::{ApiOperation, InMemoryConversationApi};
pub use journal::{Gate, Journal, JournalEntry};
