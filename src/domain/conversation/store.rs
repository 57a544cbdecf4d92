//! Ordered message sequence for the active conversation.

use super::ChatMessage;

/// Append-only sequence of chat turns for exactly one conversation.
///
/// The store never deduplicates. Keeping a server echo from showing up
/// twice is the session controller's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole sequence with authoritative history.
    pub fn replace_all(&mut self, messages: impl IntoIterator<Item = ChatMessage>) {
        self.messages = messages.into_iter().collect();
    }

    /// Adds a turn at the end.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Takes back a turn that never reached the server.
    pub fn remove(&mut self, index: usize) -> Option<ChatMessage> {
        (index < self.messages.len()).then(|| self.messages.remove(index))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
