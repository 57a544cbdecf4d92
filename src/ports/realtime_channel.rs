//! Realtime channel port - one logical connection per conversation.
//!
//! A transport (WebSocket, in-memory fake) is started by a
//! [`RealtimeConnector`] and talks to the session through a pair of
//! channel ends:
//!
//! ```text
//!   SessionController                      transport task
//!  ┌────────────────┐   OutboundFrame    ┌─────────────────┐
//!  │ ChannelHandle  │ ─────────────────▶ │ ChannelEndpoint │
//!  │                │ ◀───────────────── │                 │
//!  │                │   raw payloads     │                 │
//!  │                │ ◀───────────────── │                 │
//!  │                │  ConnectionStatus  │                 │
//!  │                │ ─────────────────▶ │                 │
//!  └────────────────┘     shutdown       └─────────────────┘
//! ```
//!
//! # Send policy
//!
//! Frames are queued until the channel is open. The outbound queue is a
//! bounded FIFO: the transport only drains it while connected, so anything
//! sent during `Connecting`/`Reconnecting` is flushed in order on the next
//! open. A full queue fails with [`ChannelError::QueueFull`]; a closed
//! handle fails with [`ChannelError::Closed`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::domain::conversation::ConnectionStatus;
use crate::domain::foundation::ConversationId;

/// Inbound payloads buffered between transport and session.
const INBOUND_BUFFER: usize = 256;

/// Starts realtime connections bound to a conversation.
pub trait RealtimeConnector: Send + Sync {
    /// Opens a channel for `conversation_id`.
    ///
    /// Returns immediately; the handshake runs in the background and is
    /// reported through [`ChannelHandle::next_event`].
    fn open(&self, conversation_id: ConversationId) -> ChannelHandle;
}

/// Frame sent to the assistant for one user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: String,
    pub chat_id: ConversationId,
}

impl OutboundFrame {
    pub fn new(message: impl Into<String>, chat_id: ConversationId) -> Self {
        Self {
            message: message.into(),
            chat_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Diagnostic frame (`type == "debug"`); carries no session meaning.
    Debug(serde_json::Value),

    /// Assistant reply.
    Reply {
        message: String,
        kind: Option<String>,
    },
}

impl InboundFrame {
    /// Classifies a raw text payload by its `type` discriminator.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let Some(object) = value.as_object() else {
            return Err(ProtocolError::unrecognized(raw));
        };

        let kind = object
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_string);

        if kind.as_deref() == Some("debug") {
            return Ok(InboundFrame::Debug(value));
        }

        match object.get("message").and_then(|m| m.as_str()) {
            Some(message) => Ok(InboundFrame::Reply {
                message: message.to_string(),
                kind,
            }),
            None => Err(ProtocolError::unrecognized(raw)),
        }
    }
}

/// Inbound payload the session cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unrecognized frame: {0}")]
    Unrecognized(String),
}

impl ProtocolError {
    const PREVIEW_CHARS: usize = 120;

    fn unrecognized(raw: &str) -> Self {
        ProtocolError::Unrecognized(raw.chars().take(Self::PREVIEW_CHARS).collect())
    }
}

/// Errors from [`ChannelHandle::send`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Outbound queue is full ({capacity} frames)")]
    QueueFull { capacity: usize },

    #[error("Channel is closed")]
    Closed,
}

/// What the session observes on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Latest connection status. Intermediate values may be coalesced.
    Status(ConnectionStatus),

    /// Raw inbound text, in arrival order.
    Payload(String),

    /// The transport has stopped for good.
    Terminated,
}

/// Session side of a realtime channel. Exactly one owner.
///
/// Dropping the handle closes the channel.
#[derive(Debug)]
pub struct ChannelHandle {
    conversation_id: ConversationId,
    capacity: usize,
    outbound: mpsc::Sender<OutboundFrame>,
    inbound: mpsc::Receiver<String>,
    status: watch::Receiver<ConnectionStatus>,
    shutdown: watch::Sender<bool>,
    status_gone: bool,
    terminated: bool,
    closed: bool,
}

/// Transport side of a realtime channel.
#[derive(Debug)]
pub struct ChannelEndpoint {
    pub conversation_id: ConversationId,
    pub outbound: mpsc::Receiver<OutboundFrame>,
    inbound: mpsc::Sender<String>,
    status: watch::Sender<ConnectionStatus>,
    shutdown: watch::Receiver<bool>,
}

impl ChannelHandle {
    /// Creates a connected handle/endpoint pair.
    ///
    /// `queue_capacity` bounds how many outbound frames may wait for an
    /// open connection.
    pub fn pair(conversation_id: ConversationId, queue_capacity: usize) -> (Self, ChannelEndpoint) {
        let capacity = queue_capacity.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = Self {
            conversation_id,
            capacity,
            outbound: outbound_tx,
            inbound: inbound_rx,
            status: status_rx,
            shutdown: shutdown_tx,
            status_gone: false,
            terminated: false,
            closed: false,
        };
        let endpoint = ChannelEndpoint {
            conversation_id,
            outbound: outbound_rx,
            inbound: inbound_tx,
            status: status_tx,
            shutdown: shutdown_rx,
        };
        (handle, endpoint)
    }

    /// Conversation this channel is bound to.
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        if self.closed || self.terminated {
            return ConnectionStatus::Disconnected;
        }
        *self.status.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once the transport has exited and nothing more will be sent or
    /// received.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Queues a frame for transmission.
    pub fn send(&self, frame: OutboundFrame) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    /// Waits for the next status change or inbound payload.
    ///
    /// Never resolves once the handle is closed or the transport has
    /// terminated, so it is safe to poll in a `select!` loop.
    pub async fn next_event(&mut self) -> ChannelEvent {
        if self.closed || self.terminated {
            return std::future::pending().await;
        }

        loop {
            tokio::select! {
                biased;

                changed = self.status.changed(), if !self.status_gone => {
                    match changed {
                        Ok(()) => return ChannelEvent::Status(*self.status.borrow_and_update()),
                        Err(_) => self.status_gone = true,
                    }
                }

                payload = self.inbound.recv() => {
                    return match payload {
                        Some(payload) => ChannelEvent::Payload(payload),
                        None => {
                            self.terminated = true;
                            ChannelEvent::Terminated
                        }
                    };
                }
            }
        }
    }

    /// Closes the channel. Idempotent.
    ///
    /// Anything still buffered inbound is discarded, so nothing from this
    /// channel can reach the session afterwards.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shutdown.send_replace(true);
        self.inbound.close();
        tracing::debug!(conversation_id = %self.conversation_id, "Realtime channel closed");
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl ChannelEndpoint {
    /// Publishes a status change to the session.
    pub fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    /// Hands an inbound payload to the session.
    ///
    /// Returns `false` once the session side is gone.
    pub async fn deliver(&self, payload: String) -> bool {
        self.inbound.send(payload).await.is_ok()
    }

    /// Detached copy of the shutdown signal, so a transport can wait on it
    /// while borrowing the outbound queue mutably.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal(self.shutdown.clone())
    }
}

/// Close request from the session side of a channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub fn is_requested(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once close was requested or the handle is gone.
    pub async fn requested(&mut self) {
        let _ = self.0.wait_for(|closed| *closed).await;
    }
}
