//! SessionController - owns the live conversation.
//!
//! Runs as one tokio task that serializes everything touching session
//! state: commands from [`SessionHandle`]s, completions of REST calls it
//! started, and events from the realtime channel it owns.
//!
//! # Ordering
//!
//! - The first message of a new conversation is appended once the server
//!   has assigned an id and is transmitted only after the channel reports
//!   `Open`.
//! - Inbound payloads are applied in the order the channel delivers them.
//! - The previous channel is closed before a new one is opened.
//!
//! # Stale completions
//!
//! Every REST call carries the epoch it was started in. Starting over,
//! loading and ending bump the epoch; a completion from an older epoch is
//! dropped and its caller gets [`SessionError::Superseded`].

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::error::SessionError;
use super::handle::{Command, Reply, SendOutcome, SessionHandle, SessionSnapshot};
use crate::domain::conversation::{
    ChatMessage, ConnectionStatus, ConversationDetail, EndedConversation, HistoryMessage,
    MessageStore, SessionPhase,
};
use crate::domain::foundation::{ConversationId, StateMachine};
use crate::ports::{
    ApiError, ChannelError, ChannelEvent, ChannelHandle, ConversationApi, InboundFrame,
    OutboundFrame, RealtimeConnector,
};

const COMMAND_BUFFER: usize = 32;

/// A user turn accepted but not yet handed to the channel.
struct PendingSend {
    text: String,
    reply: Reply<SendOutcome>,
    /// Index in the store once the turn has been appended.
    position: Option<usize>,
}

impl PendingSend {
    fn new(text: String, reply: Reply<SendOutcome>) -> Self {
        Self {
            text,
            reply,
            position: None,
        }
    }
}

enum Completion {
    Created {
        epoch: u64,
        result: Result<ConversationId, ApiError>,
    },
    Loaded {
        epoch: u64,
        id: ConversationId,
        result: Result<ConversationDetail, ApiError>,
        reply: Reply<()>,
    },
    Ended {
        epoch: u64,
        id: ConversationId,
        result: Result<EndedConversation, ApiError>,
        reply: Reply<Option<String>>,
    },
}

/// Single owner of conversation id, transcript and realtime channel.
pub struct SessionController {
    api: Arc<dyn ConversationApi>,
    connector: Arc<dyn RealtimeConnector>,
    commands: mpsc::Receiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    snapshots: watch::Sender<SessionSnapshot>,

    epoch: u64,
    phase: SessionPhase,
    conversation_id: Option<ConversationId>,
    store: MessageStore,
    pending_reply: bool,
    /// A turn handed to the channel has had no reply yet.
    awaiting_reply: bool,
    channel: Option<ChannelHandle>,
    connection: ConnectionStatus,
    last_error: Option<SessionError>,
    /// Accepted before the conversation existed; not in the store yet.
    held: VecDeque<PendingSend>,
    /// In the store, waiting for the channel to open.
    unsent: VecDeque<PendingSend>,
}

impl SessionController {
    pub fn new(
        api: Arc<dyn ConversationApi>,
        connector: Arc<dyn RealtimeConnector>,
    ) -> (Self, SessionHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let controller = Self {
            api,
            connector,
            commands,
            completions,
            completion_tx,
            snapshots,
            epoch: 0,
            phase: SessionPhase::NoConversation,
            conversation_id: None,
            store: MessageStore::new(),
            pending_reply: false,
            awaiting_reply: false,
            channel: None,
            connection: ConnectionStatus::Disconnected,
            last_error: None,
            held: VecDeque::new(),
            unsent: VecDeque::new(),
        };
        (controller, SessionHandle::new(command_tx, snapshot_rx))
    }

    /// Spawns the controller on the current runtime.
    pub fn spawn(
        api: Arc<dyn ConversationApi>,
        connector: Arc<dyn RealtimeConnector>,
    ) -> SessionHandle {
        let (controller, handle) = Self::new(api, connector);
        tokio::spawn(controller.run());
        handle
    }

    /// Runs until shut down or every handle is dropped.
    pub async fn run(mut self) {
        tracing::debug!("Session controller started");

        loop {
            let keep_running = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => false,
                },

                Some(completion) = self.completions.recv() => {
                    self.on_completion(completion);
                    true
                }

                event = next_channel_event(&mut self.channel) => {
                    self.on_channel_event(event);
                    true
                }
            };

            self.publish();
            if !keep_running {
                break;
            }
        }

        self.stop();
        self.publish();
        tracing::debug!("Session controller stopped");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Send { text, reply } => self.send_user_message(text, reply),
            Command::StartNew { reply } => {
                self.start_new_conversation();
                self.answer(reply, Ok(()));
            }
            Command::End { reply } => self.end_conversation(reply),
            Command::Load { id, reply } => self.load_conversation(id, reply),
            Command::Shutdown { reply } => {
                self.stop();
                self.answer(reply, Ok(()));
                return false;
            }
        }
        true
    }

    fn send_user_message(&mut self, text: String, reply: Reply<SendOutcome>) {
        if text.trim().is_empty() {
            self.answer(reply, Ok(SendOutcome::Ignored));
            return;
        }

        let pending = PendingSend::new(text, reply);
        match self.phase {
            SessionPhase::Ended => self.answer(pending.reply, Err(SessionError::ConversationEnded)),
            SessionPhase::NoConversation => {
                self.held.push_back(pending);
                self.begin_create();
            }
            SessionPhase::Creating | SessionPhase::Loading => self.held.push_back(pending),
            SessionPhase::AwaitingChannelReady if self.channel_terminated() => {
                let error = SessionError::Channel(ChannelError::Closed);
                self.last_error = Some(error.clone());
                self.answer(pending.reply, Err(error));
            }
            SessionPhase::AwaitingChannelReady => self.queue_unsent(pending),
            SessionPhase::Active => {
                self.transmit(pending);
            }
        }
    }

    fn start_new_conversation(&mut self) {
        self.clear_session(SessionError::Superseded);
        self.enter(SessionPhase::NoConversation);
        self.last_error = None;
        tracing::info!(epoch = self.epoch, "Started new conversation");
    }

    fn end_conversation(&mut self, reply: Reply<Option<String>>) {
        let Some(id) = self.conversation_id else {
            self.answer(reply, Err(SessionError::NoActiveConversation));
            return;
        };

        let epoch = self.epoch;
        let api = self.api.clone();
        let completions = self.completion_tx.clone();
        tracing::info!(conversation_id = %id, epoch, "Ending conversation");

        tokio::spawn(async move {
            let result = api.end_conversation(id).await;
            let _ = completions.send(Completion::Ended {
                epoch,
                id,
                result,
                reply,
            });
        });
    }

    fn load_conversation(&mut self, id: ConversationId, reply: Reply<()>) {
        if self.phase == SessionPhase::Ended {
            self.enter(SessionPhase::NoConversation);
        }
        self.clear_session(SessionError::Superseded);
        self.enter(SessionPhase::Loading);
        self.last_error = None;

        let epoch = self.epoch;
        let api = self.api.clone();
        let completions = self.completion_tx.clone();
        tracing::info!(conversation_id = %id, epoch, "Loading conversation");

        tokio::spawn(async move {
            let result = api.get_conversation(id).await;
            let _ = completions.send(Completion::Loaded {
                epoch,
                id,
                result,
                reply,
            });
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Completions
    // ─────────────────────────────────────────────────────────────────────

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Created { epoch, result } => self.on_created(epoch, result),
            Completion::Loaded {
                epoch,
                id,
                result,
                reply,
            } => self.on_loaded(epoch, id, result, reply),
            Completion::Ended {
                epoch,
                id,
                result,
                reply,
            } => self.on_ended(epoch, id, result, reply),
        }
    }

    fn on_created(&mut self, epoch: u64, result: Result<ConversationId, ApiError>) {
        if epoch != self.epoch || self.phase != SessionPhase::Creating {
            if let Ok(id) = result {
                tracing::info!(conversation_id = %id, epoch, "Discarding conversation created for a stale session");
            }
            return;
        }

        match result {
            Ok(id) => {
                tracing::info!(conversation_id = %id, epoch, "Conversation created");
                self.conversation_id = Some(id);
                self.bind_channel(id);
            }
            Err(e) => {
                tracing::warn!(error = %e, epoch, "Conversation creation failed");
                let error = SessionError::Creation(e);
                self.enter(SessionPhase::NoConversation);
                self.last_error = Some(error.clone());
                self.fail_pending(error);
            }
        }
    }

    fn on_loaded(
        &mut self,
        epoch: u64,
        id: ConversationId,
        result: Result<ConversationDetail, ApiError>,
        reply: Reply<()>,
    ) {
        if epoch != self.epoch || self.phase != SessionPhase::Loading {
            tracing::debug!(conversation_id = %id, epoch, "Discarding stale history");
            self.answer(reply, Err(SessionError::Superseded));
            return;
        }

        match result {
            Ok(detail) => {
                tracing::info!(
                    conversation_id = %id,
                    messages = detail.messages.len(),
                    "Conversation history loaded"
                );
                self.store.replace_all(
                    detail
                        .messages
                        .into_iter()
                        .map(HistoryMessage::into_chat_message),
                );
                self.pending_reply = false;
                self.conversation_id = Some(id);
                self.bind_channel(id);
                self.answer(reply, Ok(()));
            }
            Err(e) => {
                tracing::warn!(conversation_id = %id, error = %e, "Loading conversation failed");
                let error = SessionError::Load(e);
                self.enter(SessionPhase::NoConversation);
                self.last_error = Some(error.clone());
                self.fail_pending(error.clone());
                self.answer(reply, Err(error));
            }
        }
    }

    fn on_ended(
        &mut self,
        epoch: u64,
        id: ConversationId,
        result: Result<EndedConversation, ApiError>,
        reply: Reply<Option<String>>,
    ) {
        if epoch != self.epoch || self.conversation_id != Some(id) {
            tracing::debug!(conversation_id = %id, epoch, "Discarding stale end result");
            self.answer(reply, Err(SessionError::Superseded));
            return;
        }

        match result {
            Ok(ended) => {
                tracing::info!(
                    conversation_id = %id,
                    has_summary = ended.summary.is_some(),
                    "Conversation ended"
                );
                self.clear_session(SessionError::ConversationEnded);
                self.enter(SessionPhase::Ended);
                self.last_error = None;
                self.answer(reply, Ok(ended.summary));
            }
            Err(e) => {
                tracing::warn!(conversation_id = %id, error = %e, "Ending conversation failed");
                let error = SessionError::End(e);
                self.last_error = Some(error.clone());
                self.answer(reply, Err(error));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Channel
    // ─────────────────────────────────────────────────────────────────────

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Status(status) => {
                tracing::debug!(status = status.label(), "Channel status changed");
                self.connection = status;
                if status.is_usable() {
                    self.channel_ready();
                }
            }
            ChannelEvent::Payload(raw) => self.on_payload(&raw),
            ChannelEvent::Terminated => {
                tracing::warn!(
                    conversation_id = ?self.conversation_id,
                    unsent = self.unsent.len(),
                    "Realtime channel gave up"
                );
                let error = SessionError::Channel(ChannelError::Closed);
                self.connection = ConnectionStatus::Disconnected;
                self.awaiting_reply = false;
                self.pending_reply = false;
                self.last_error = Some(error.clone());
                self.abandon_unsent(error);
            }
        }
    }

    fn on_payload(&mut self, raw: &str) {
        match InboundFrame::parse(raw) {
            Ok(InboundFrame::Debug(value)) => {
                tracing::trace!(%value, "Debug frame");
            }
            Ok(InboundFrame::Reply { message, kind }) => {
                tracing::debug!(kind = kind.as_deref().unwrap_or("-"), "Assistant reply");
                self.store.append(ChatMessage::ai(message));
                self.awaiting_reply = false;
                self.pending_reply = false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring inbound frame");
                self.last_error = Some(e.into());
            }
        }
    }

    /// Opens the channel for `id` and moves held turns into the transcript.
    fn bind_channel(&mut self, id: ConversationId) {
        self.close_channel();
        let channel = self.connector.open(id);
        self.connection = channel.status();
        self.channel = Some(channel);
        self.enter(SessionPhase::AwaitingChannelReady);

        while let Some(pending) = self.held.pop_front() {
            self.queue_unsent(pending);
        }

        if self.connection.is_usable() {
            self.channel_ready();
        }
    }

    fn channel_ready(&mut self) {
        if self.phase != SessionPhase::AwaitingChannelReady {
            return;
        }
        self.enter(SessionPhase::Active);
        tracing::debug!(
            conversation_id = ?self.conversation_id,
            queued = self.unsent.len(),
            "Channel ready"
        );
        let mut removed = 0;
        while let Some(mut pending) = self.unsent.pop_front() {
            pending.position = pending.position.map(|p| p - removed);
            if !self.transmit(pending) {
                removed += 1;
            }
        }
    }

    /// Hands a turn to the channel and answers its caller.
    ///
    /// A turn not yet in the store is appended only once the channel took
    /// it; a stored turn the channel refused is removed again. Returns
    /// whether the channel took it.
    fn transmit(&mut self, pending: PendingSend) -> bool {
        let PendingSend {
            text,
            reply,
            position,
        } = pending;
        let result = match (self.conversation_id, self.channel.as_ref()) {
            (Some(id), Some(channel)) => channel
                .send(OutboundFrame::new(text.as_str(), id))
                .map_err(SessionError::from),
            _ => Err(SessionError::NoActiveConversation),
        };

        match result {
            Ok(()) => {
                if position.is_none() {
                    self.append_user(&text);
                }
                self.awaiting_reply = true;
                self.pending_reply = true;
                self.answer(reply, Ok(SendOutcome::Sent));
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "User message not sent");
                if let Some(position) = position {
                    self.store.remove(position);
                }
                self.pending_reply = self.awaiting_reply;
                self.last_error = Some(e.clone());
                self.answer(reply, Err(e));
                false
            }
        }
    }

    /// Fails every turn still waiting for the channel and takes them back
    /// out of the store.
    fn abandon_unsent(&mut self, error: SessionError) {
        let unsent: Vec<PendingSend> = self.unsent.drain(..).collect();
        for position in unsent.iter().rev().filter_map(|pending| pending.position) {
            self.store.remove(position);
        }
        for PendingSend { reply, .. } in unsent {
            self.answer(reply, Err(error.clone()));
        }
    }

    fn channel_terminated(&self) -> bool {
        self.channel.as_ref().map_or(true, ChannelHandle::is_terminated)
    }

    fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.connection = ConnectionStatus::Disconnected;
    }

    // ─────────────────────────────────────────────────────────────────────
    // State helpers
    // ─────────────────────────────────────────────────────────────────────

    fn begin_create(&mut self) {
        self.enter(SessionPhase::Creating);

        let epoch = self.epoch;
        let api = self.api.clone();
        let completions = self.completion_tx.clone();
        tracing::info!(epoch, "Creating conversation");

        tokio::spawn(async move {
            let result = api.create_conversation().await;
            let _ = completions.send(Completion::Created { epoch, result });
        });
    }

    fn append_user(&mut self, text: &str) -> usize {
        self.store.append(ChatMessage::user(text));
        self.pending_reply = true;
        self.store.len() - 1
    }

    fn queue_unsent(&mut self, mut pending: PendingSend) {
        pending.position = Some(self.append_user(&pending.text));
        self.unsent.push_back(pending);
    }

    /// Forgets the current conversation and invalidates in-flight calls.
    fn clear_session(&mut self, reason: SessionError) {
        self.epoch += 1;
        self.close_channel();
        self.conversation_id = None;
        self.store.clear();
        self.pending_reply = false;
        self.awaiting_reply = false;
        self.fail_pending(reason);
    }

    fn fail_pending(&mut self, error: SessionError) {
        let pending: Vec<PendingSend> = self.held.drain(..).chain(self.unsent.drain(..)).collect();
        for PendingSend { reply, .. } in pending {
            self.answer(reply, Err(error.clone()));
        }
    }

    fn stop(&mut self) {
        self.close_channel();
        self.fail_pending(SessionError::ControllerStopped);
    }

    fn enter(&mut self, next: SessionPhase) {
        if self.phase == next {
            return;
        }
        self.phase = match self.phase.transition_to(next) {
            Ok(phase) => phase,
            Err(e) => {
                tracing::error!(error = %e, "Unexpected session phase change");
                next
            }
        };
    }

    /// Publishes state, then replies, so callers always observe the
    /// state their call produced.
    fn answer<T>(&self, reply: Reply<T>, result: Result<T, SessionError>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn publish(&self) {
        let next = SessionSnapshot {
            conversation_id: self.conversation_id,
            phase: self.phase,
            messages: self.store.messages().to_vec(),
            pending_reply: self.pending_reply,
            connection: self.connection,
            last_error: self.last_error.clone(),
        };
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

async fn next_channel_event(channel: &mut Option<ChannelHandle>) -> ChannelEvent {
    match channel {
        Some(channel) => channel.next_event().await,
        None => std::future::pending().await,
    }
}
