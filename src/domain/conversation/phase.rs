//! Session phase state machine.
//!
//! ```text
//! NoConversation ──send──▶ Creating ──created──▶ AwaitingChannelReady ──open──▶ Active ──end──▶ Ended
//!        │                                              ▲      │                               ▲
//!        └──────load──────▶ Loading ──history───────────┘      └──────────────end──────────────┘
//!
//! Any non-ended phase ──start new──▶ NoConversation
//! Any non-ended phase ──load──▶ Loading
//! Ended ──start new──▶ NoConversation
//! ```
//!
//! Whether a reply is outstanding is tracked beside the phase, not inside it.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Where the session is in the conversation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No conversation yet; the next user message creates one.
    #[default]
    NoConversation,

    /// Create-conversation request in flight.
    Creating,

    /// Fetching history of an existing conversation.
    Loading,

    /// Conversation exists, channel handshake not finished.
    AwaitingChannelReady,

    /// Channel usable; user turns go straight out.
    Active,

    /// Conversation ended on the server; only a fresh start leaves here.
    Ended,
}

impl StateMachine for SessionPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionPhase::*;
        matches!(
            (self, target),
            (NoConversation, Creating)
                | (NoConversation, Loading)
                | (Creating, AwaitingChannelReady)
                | (Creating, NoConversation)
                | (Creating, Loading)
                | (Loading, AwaitingChannelReady)
                | (Loading, NoConversation)
                | (Loading, Loading)
                | (AwaitingChannelReady, Active)
                | (AwaitingChannelReady, NoConversation)
                | (AwaitingChannelReady, Loading)
                | (AwaitingChannelReady, Ended)
                | (Active, Ended)
                | (Active, NoConversation)
                | (Active, Loading)
                | (Ended, NoConversation)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionPhase::*;
        match self {
            NoConversation => vec![Creating, Loading],
            Creating => vec![AwaitingChannelReady, NoConversation, Loading],
            Loading => vec![AwaitingChannelReady, NoConversation, Loading],
            AwaitingChannelReady => vec![Active, NoConversation, Loading, Ended],
            Active => vec![Ended, NoConversation, Loading],
            Ended => vec![NoConversation],
        }
    }
}
