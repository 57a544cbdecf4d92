//! Shared call journal and completion gates for the in-memory adapters.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::domain::foundation::ConversationId;
use crate::ports::OutboundFrame;

/// Something an in-memory adapter observed, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    CreateRequested,
    Created(ConversationId),
    Fetched(ConversationId),
    Ended(ConversationId),
    Listed,
    Queried(String),
    ChannelOpened(ConversationId),
    ChannelReady(ConversationId),
    FrameSent(OutboundFrame),
    ChannelClosed(ConversationId),
}

/// Append-only log shared between fakes so tests can assert cross-adapter
/// ordering (create, open, ready, send).
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: JournalEntry) {
        self.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().clone()
    }

    /// Index of the first entry equal to `entry`.
    pub fn position(&self, entry: &JournalEntry) -> Option<usize> {
        self.lock().iter().position(|e| e == entry)
    }

    pub fn frames_sent(&self) -> Vec<OutboundFrame> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                JournalEntry::FrameSent(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Holds async operations until a test releases them.
///
/// Gates start open. `hold()` makes subsequent `pass()` calls wait until
/// `release()`.
#[derive(Debug, Clone)]
pub struct Gate {
    open: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self {
            open: Arc::new(open),
        }
    }

    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    pub fn is_held(&self) -> bool {
        !*self.open.borrow()
    }

    /// Waits until the gate is open.
    pub async fn pass(&self) {
        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
