//! Cloneable front door to a running session controller.

use tokio::sync::{mpsc, oneshot, watch};

use super::error::SessionError;
use crate::domain::conversation::{ChatMessage, ConnectionStatus, SessionPhase};
use crate::domain::foundation::ConversationId;

/// Result of [`SessionHandle::send_user_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank after trimming; nothing changed.
    Ignored,
    /// Appended to the transcript and handed to the realtime channel.
    Sent,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub conversation_id: Option<ConversationId>,
    pub phase: SessionPhase,
    pub messages: Vec<ChatMessage>,
    /// A user turn is waiting for the assistant.
    pub pending_reply: bool,
    pub connection: ConnectionStatus,
    /// Latest non-fatal problem; cleared by the next fresh start.
    pub last_error: Option<SessionError>,
}

pub(super) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

#[derive(Debug)]
pub(super) enum Command {
    Send { text: String, reply: Reply<SendOutcome> },
    StartNew { reply: Reply<()> },
    End { reply: Reply<Option<String>> },
    Load { id: ConversationId, reply: Reply<()> },
    Shutdown { reply: Reply<()> },
}

/// Handle to a [`SessionController`](super::SessionController) task.
///
/// Every method round-trips through the controller, so calls from
/// different clones are applied in the order the controller receives them.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub(super) fn new(
        commands: mpsc::Sender<Command>,
        snapshots: watch::Receiver<SessionSnapshot>,
    ) -> Self {
        Self {
            commands,
            snapshots,
        }
    }

    /// Sends a user turn.
    ///
    /// With no conversation yet, one is created first and the message goes
    /// out once the new channel is ready. Resolves when the message has
    /// been handed to the channel.
    pub async fn send_user_message(&self, text: impl Into<String>) -> Result<SendOutcome, SessionError> {
        let text = text.into();
        self.request(|reply| Command::Send { text, reply }).await
    }

    /// Drops the current conversation locally. No network call.
    pub async fn start_new_conversation(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::StartNew { reply }).await
    }

    /// Ends the current conversation and returns the server's summary.
    pub async fn end_conversation(&self) -> Result<Option<String>, SessionError> {
        self.request(|reply| Command::End { reply }).await
    }

    /// Switches to an existing conversation, replacing the transcript with
    /// its server-side history.
    pub async fn load_conversation(&self, id: ConversationId) -> Result<(), SessionError> {
        self.request(|reply| Command::Load { id, reply }).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that is notified whenever the snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Stops the controller and closes its channel.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::ControllerStopped)?;
        response.await.map_err(|_| SessionError::ControllerStopped)?
    }
}
