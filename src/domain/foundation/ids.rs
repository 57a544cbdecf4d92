//! Server-assigned identifier value objects.
//!
//! The backend hands out plain integer primary keys. They are opaque to the
//! client: never incremented, compared only for equality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Handle of a conversation on the backend.
///
/// Absent (`None` at the call site) means "no conversation yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(i64);

impl ConversationId {
    /// Wraps a raw server identifier.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw server identifier.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<i64> for ConversationId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Handle of a persisted message (history view only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(i64);

impl MessageId {
    /// Wraps a raw server identifier.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw server identifier.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_serializes_as_bare_integer() {
        let id = ConversationId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }

    #[test]
    fn conversation_id_deserializes_from_integer() {
        let id: ConversationId = serde_json::from_str("7").unwrap();
        assert_eq!(id.get(), 7);
    }

    #[test]
    fn conversation_id_parses_trimmed_input() {
        let id: ConversationId = " 13 ".parse().unwrap();
        assert_eq!(id, ConversationId::new(13));
    }

    #[test]
    fn conversation_id_rejects_non_numeric_input() {
        assert!("abc".parse::<ConversationId>().is_err());
    }

    #[test]
    fn display_renders_raw_value() {
        assert_eq!(ConversationId::new(5).to_string(), "5");
        assert_eq!(MessageId::new(9).to_string(), "9");
    }
}
