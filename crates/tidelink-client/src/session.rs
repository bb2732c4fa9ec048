//! Chat session orchestration.
//!
//! [`ChatSession`] owns the transport channel, the subscription registry,
//! and both reconciliation stores for one logged-in user. It is the single
//! mutator of its own state: every mutation happens on the caller's thread
//! in response to either a user-initiated call or a transport callback, so
//! no locking is involved.
//!
//! The session follows the action pattern: operations return
//! [`SessionAction`] values and the driver executes them (dial the socket,
//! write frames, issue API requests, surface notices). API completions
//! come back through the `complete_*` / `send_*` / `room_created` entry
//! points.

use tidelink_core::{
    ChannelAction, ChannelConfig, ChannelState, TransportChannel, env::Environment,
};
use tidelink_proto::{MessageRecord, RoomRecord, message_channel, room_directory_channel};

use crate::{
    error::SessionError,
    event::{ApiRequest, SessionAction, SessionNotice, SyncEvent},
    messages::{MessageEntry, MessageStore, TempId},
    registry::{Handler, SubscriptionId, SubscriptionRegistry},
    rooms::RoomDirectory,
};

/// Handler for a room's message channel: decode and route.
fn message_handler<I>() -> Handler<I, SyncEvent> {
    Box::new(|event| {
        let record: MessageRecord = event.decode_payload()?;
        Ok(Some(SyncEvent::MessageCreated(record)))
    })
}

/// Handler for the user's room-directory channel: decode and route.
fn directory_handler<I>() -> Handler<I, SyncEvent> {
    Box::new(|event| {
        let record: RoomRecord = event.decode_payload()?;
        Ok(Some(SyncEvent::RoomUpserted(record)))
    })
}

/// One user's live chat session.
///
/// Created at login, discarded wholesale at logout; nothing is shared
/// across sessions.
pub struct ChatSession<E: Environment> {
    env: E,
    user_id: String,
    channel: TransportChannel<E::Instant>,
    registry: SubscriptionRegistry<E::Instant, SyncEvent>,
    messages: MessageStore,
    rooms: RoomDirectory,
    /// Room currently on screen; inbound message events for other rooms
    /// are dropped.
    active_room: Option<String>,
    room_sub: Option<SubscriptionId>,
    directory_sub: Option<SubscriptionId>,
}

impl<E: Environment> ChatSession<E> {
    /// Create a session for a user.
    pub fn new(env: E, user_id: impl Into<String>, config: ChannelConfig) -> Self {
        Self {
            env,
            user_id: user_id.into(),
            channel: TransportChannel::new(config),
            registry: SubscriptionRegistry::new(),
            messages: MessageStore::new(),
            rooms: RoomDirectory::new(),
            active_room: None,
            room_sub: None,
            directory_sub: None,
        }
    }

    /// The session owner's user id.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Current transport connection state.
    pub fn connection_state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Room currently on screen.
    pub fn active_room(&self) -> Option<&str> {
        self.active_room.as_deref()
    }

    /// Rendered message log for a room, `created_at`-ascending.
    pub fn messages(&self, room_id: &str) -> &[MessageEntry] {
        self.messages.entries(room_id)
    }

    /// Current room list, most-recently-updated first.
    pub fn rooms(&self) -> &[RoomRecord] {
        self.rooms.rooms()
    }

    /// Start the session: dial the transport, subscribe the room
    /// directory, and load the room list.
    ///
    /// # Errors
    ///
    /// - `SessionError::Channel` if the transport is already connecting
    pub fn login(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let channel_actions = self.channel.connect()?;
        let mut actions = self.run_channel(channel_actions);

        let directory = room_directory_channel(&self.user_id);
        let (id, frame) = self.registry.subscribe(&directory, directory_handler());
        self.directory_sub = Some(id);
        self.send_if_connected(frame, &mut actions);

        actions.extend(self.load_rooms());

        Ok(actions)
    }

    /// Switch the active room.
    ///
    /// Releases the previous room's subscription and drops its log,
    /// subscribes the new room's message channel, and starts the one-shot
    /// initial load. A still-in-flight load for the previous room is
    /// discarded when its response arrives.
    pub fn open_room(&mut self, room_id: &str) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        // Reopening the same room keeps its log and just reloads it.
        if let Some(previous) = self.active_room.take()
            && previous != room_id
        {
            self.messages.drop_room(&previous);
        }
        if let Some(old_sub) = self.room_sub.take()
            && let Some(frame) = self.registry.unsubscribe(old_sub)
        {
            self.send_if_connected(frame, &mut actions);
        }

        let channel = message_channel(room_id);
        let (id, frame) = self.registry.subscribe(&channel, message_handler());
        self.room_sub = Some(id);
        self.send_if_connected(frame, &mut actions);

        self.active_room = Some(room_id.to_string());

        let generation = self.messages.begin_load();
        actions.push(SessionAction::Request(ApiRequest::LoadMessages {
            room_id: room_id.to_string(),
            generation,
        }));

        actions
    }

    /// Complete a one-shot message load. Stale responses (a newer load
    /// started since) are discarded silently.
    pub fn complete_message_load(
        &mut self,
        room_id: &str,
        generation: u64,
        records: &[MessageRecord],
    ) -> Vec<SessionAction> {
        self.messages.complete_load(room_id, generation, records);
        vec![]
    }

    /// Send a message: append an optimistic entry synchronously and issue
    /// the confirmation request. Empty content is a no-op.
    pub fn send_message(&mut self, room_id: &str, content: &str) -> Vec<SessionAction> {
        if content.trim().is_empty() {
            return vec![];
        }

        let user_id = self.user_id.clone();
        let temp_id =
            self.messages.push_optimistic(room_id, &user_id, content, self.env.unix_millis());

        vec![SessionAction::Request(ApiRequest::SendMessage {
            room_id: room_id.to_string(),
            temp_id,
            content: content.to_string(),
        })]
    }

    /// A send confirmation succeeded.
    ///
    /// The response is not authoritative for list insertion; it only
    /// correlates the optimistic entry with the authoritative id so the
    /// echo event (which may already have arrived) supersedes exactly that
    /// entry.
    pub fn send_succeeded(
        &mut self,
        room_id: &str,
        temp_id: TempId,
        message_id: &str,
    ) -> Vec<SessionAction> {
        self.messages.record_confirmation(room_id, temp_id, message_id);
        vec![]
    }

    /// A send confirmation failed: roll back the optimistic entry and
    /// surface the error. No automatic retry.
    pub fn send_failed(&mut self, room_id: &str, temp_id: TempId, reason: &str) -> Vec<SessionAction> {
        self.messages.rollback(room_id, temp_id);
        vec![SessionAction::Notify(SessionNotice::SendFailed {
            room_id: room_id.to_string(),
            reason: reason.to_string(),
        })]
    }

    /// Reload the room list (also issued automatically at login).
    pub fn load_rooms(&mut self) -> Vec<SessionAction> {
        vec![SessionAction::Request(ApiRequest::LoadRooms { user_id: self.user_id.clone() })]
    }

    /// Complete the one-shot room list load.
    pub fn complete_room_load(&mut self, records: Vec<RoomRecord>) -> Vec<SessionAction> {
        self.rooms.replace_all(records);
        vec![]
    }

    /// Create a group room.
    pub fn create_group(&mut self, name: &str, member_ids: Vec<String>) -> Vec<SessionAction> {
        vec![SessionAction::Request(ApiRequest::CreateGroup {
            name: name.to_string(),
            member_ids,
        })]
    }

    /// Create (or fetch) a direct room.
    pub fn create_direct(&mut self, target_user_id: &str) -> Vec<SessionAction> {
        vec![SessionAction::Request(ApiRequest::CreateDirect {
            target_user_id: target_user_id.to_string(),
        })]
    }

    /// A room creation request succeeded.
    ///
    /// Creation responses are authoritative (no duplicate-delivery risk),
    /// so the room is upserted immediately rather than waiting for the
    /// live event.
    pub fn room_created(&mut self, room: RoomRecord) -> Vec<SessionAction> {
        self.rooms.upsert(room);
        vec![]
    }

    /// A room creation request failed: nothing was inserted.
    pub fn create_failed(&mut self, reason: &str) -> Vec<SessionAction> {
        vec![SessionAction::Notify(SessionNotice::CreateFailed { reason: reason.to_string() })]
    }

    /// The transport reported an open connection.
    pub fn transport_opened(&mut self) -> Vec<SessionAction> {
        let actions = self.channel.on_open();
        self.run_channel(actions)
    }

    /// The transport closed or the dial failed.
    pub fn transport_closed(&mut self, now: E::Instant, reason: &str) -> Vec<SessionAction> {
        let actions = self.channel.on_close(now, reason);
        self.run_channel(actions)
    }

    /// Periodic maintenance: drives the reconnect backoff.
    pub fn tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let actions = self.channel.tick(now);
        self.run_channel(actions)
    }

    /// Route one raw inbound frame.
    ///
    /// Malformed frames, frames for unsubscribed channels, and handler
    /// failures are absorbed here; they never reach the caller as errors.
    /// Message events for rooms other than the active one are dropped.
    pub fn handle_frame(&mut self, raw: &str) -> Vec<SessionAction> {
        let now = self.env.now();

        match self.registry.dispatch(raw, now) {
            Some(SyncEvent::MessageCreated(record)) => {
                if self.active_room.as_deref() == Some(record.room_id.as_str()) {
                    let user_id = self.user_id.clone();
                    self.messages.apply_created(&record, &user_id);
                } else {
                    tracing::debug!(room_id = %record.room_id, "dropping event for inactive room");
                }
            },
            Some(SyncEvent::RoomUpserted(record)) => {
                self.rooms.upsert(record);
            },
            None => {},
        }

        vec![]
    }

    /// End the session: best-effort unsubscribes, transport teardown, and
    /// wholesale state discard.
    pub fn logout(&mut self) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        for sub in [self.room_sub.take(), self.directory_sub.take()].into_iter().flatten() {
            if let Some(frame) = self.registry.unsubscribe(sub) {
                self.send_if_connected(frame, &mut actions);
            }
        }

        self.channel.shutdown();
        self.messages = MessageStore::new();
        self.rooms.clear();
        self.active_room = None;

        actions
    }

    /// Transmit a registry frame only when connected.
    ///
    /// While disconnected the registration alone suffices: the reconnect
    /// hook replays subscribe frames for every registered channel, and a
    /// lost unsubscribe for a dead connection has no observable effect.
    fn send_if_connected(&mut self, frame: String, out: &mut Vec<SessionAction>) {
        if self.channel.state() != ChannelState::Connected {
            return;
        }
        for action in self.channel.send(frame) {
            if let ChannelAction::Transmit(f) = action {
                out.push(SessionAction::Transmit(f));
            }
        }
    }

    /// Convert channel actions to session actions, expanding the
    /// `Resubscribe` hook into subscribe-frame transmissions so the replay
    /// batch precedes any buffered application traffic.
    fn run_channel(&mut self, channel_actions: Vec<ChannelAction>) -> Vec<SessionAction> {
        let mut out = Vec::new();

        for action in channel_actions {
            match action {
                ChannelAction::Dial => out.push(SessionAction::Dial),
                ChannelAction::Transmit(frame) => out.push(SessionAction::Transmit(frame)),
                ChannelAction::Resubscribe => {
                    for frame in self.registry.resubscribe_frames() {
                        for sent in self.channel.send(frame) {
                            if let ChannelAction::Transmit(f) = sent {
                                out.push(SessionAction::Transmit(f));
                            }
                        }
                    }
                },
                ChannelAction::RetryScheduled { delay, .. } => {
                    out.push(SessionAction::ScheduleTick { delay });
                },
                ChannelAction::Unavailable => {
                    out.push(SessionAction::Notify(SessionNotice::TransportUnavailable));
                },
            }
        }

        out
    }
}
