//! In-memory realtime transport.
//!
//! Each opened channel is driven by a small task that stands in for the
//! socket. Tests reach the task through a [`FakeChannel`] to flip its
//! status, push inbound payloads and read what the session sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::journal::{Journal, JournalEntry};
use crate::domain::conversation::ConnectionStatus;
use crate::domain::foundation::ConversationId;
use crate::ports::{ChannelEndpoint, ChannelHandle, OutboundFrame, RealtimeConnector};

const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
enum Control {
    SetStatus(ConnectionStatus),
    Deliver(String),
    GiveUp,
}

/// Test-side view of one opened channel.
#[derive(Debug, Clone)]
pub struct FakeChannel {
    conversation_id: ConversationId,
    control: mpsc::UnboundedSender<Control>,
    sent: Arc<Mutex<Vec<OutboundFrame>>>,
    closed: Arc<AtomicBool>,
}

impl FakeChannel {
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Simulates the handshake completing.
    pub fn open(&self) {
        self.set_status(ConnectionStatus::Open);
    }

    /// Simulates a transient drop; frames queue until the next `open()`.
    pub fn drop_connection(&self) {
        self.set_status(ConnectionStatus::Reconnecting);
    }

    /// Simulates the transport exhausting its reconnect attempts.
    pub fn give_up(&self) {
        let _ = self.control.send(Control::GiveUp);
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        let _ = self.control.send(Control::SetStatus(status));
    }

    /// Pushes a raw inbound payload, as if the server had sent it.
    pub fn deliver(&self, payload: impl Into<String>) {
        let _ = self.control.send(Control::Deliver(payload.into()));
    }

    /// Frames the transport has put on the wire.
    pub fn sent(&self) -> Vec<OutboundFrame> {
        lock(&self.sent).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// [`RealtimeConnector`] whose channels live in memory.
///
/// With `auto_open` each channel reports `Open` right after it is opened;
/// otherwise it stays `Connecting` until the test calls
/// [`FakeChannel::open`].
#[derive(Debug, Clone)]
pub struct InMemoryConnector {
    auto_open: bool,
    queue_capacity: usize,
    journal: Journal,
    channels: Arc<Mutex<Vec<FakeChannel>>>,
}

impl InMemoryConnector {
    /// Channels open immediately.
    pub fn new() -> Self {
        Self {
            auto_open: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            journal: Journal::new(),
            channels: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Channels stay `Connecting` until opened by the test.
    pub fn manual() -> Self {
        Self {
            auto_open: false,
            ..Self::new()
        }
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn latest(&self) -> Option<FakeChannel> {
        lock(&self.channels).last().cloned()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.channels).len()
    }
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeConnector for InMemoryConnector {
    fn open(&self, conversation_id: ConversationId) -> ChannelHandle {
        let (handle, endpoint) = ChannelHandle::pair(conversation_id, self.queue_capacity);
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let channel = FakeChannel {
            conversation_id,
            control: control_tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };

        self.journal.record(JournalEntry::ChannelOpened(conversation_id));
        lock(&self.channels).push(channel.clone());

        if self.auto_open {
            channel.open();
        }

        tokio::spawn(drive(endpoint, control_rx, channel, self.journal.clone()));
        handle
    }
}

async fn drive(
    mut endpoint: ChannelEndpoint,
    mut control: mpsc::UnboundedReceiver<Control>,
    channel: FakeChannel,
    journal: Journal,
) {
    let conversation_id = endpoint.conversation_id;
    let mut shutdown = endpoint.shutdown_signal();
    let mut open = false;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.requested() => break,

            Some(command) = control.recv() => match command {
                Control::SetStatus(status) => {
                    open = status.is_usable();
                    endpoint.set_status(status);
                    if open {
                        journal.record(JournalEntry::ChannelReady(conversation_id));
                    }
                }
                Control::Deliver(payload) => {
                    if !endpoint.deliver(payload).await {
                        break;
                    }
                }
                Control::GiveUp => break,
            },

            Some(frame) = endpoint.outbound.recv(), if open => {
                journal.record(JournalEntry::FrameSent(frame.clone()));
                lock(&channel.sent).push(frame);
            }
        }
    }

    channel.closed.store(true, Ordering::SeqCst);
    journal.record(JournalEntry::ChannelClosed(conversation_id));
    endpoint.set_status(ConnectionStatus::Disconnected);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
