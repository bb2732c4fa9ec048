//! Inbound events, session actions, and collaborator request shapes.
//!
//! [`InboundEvent`] is the normalized form a channel handler receives.
//! [`SessionAction`] is what [`ChatSession`](crate::ChatSession) hands back
//! to its driver; the driver owns the actual I/O (socket writes, HTTP
//! calls, user-facing notices).

use std::time::Duration;

use serde::de::DeserializeOwned;
use tidelink_proto::{MessageRecord, ProtocolError, RoomRecord};

use crate::error::HandlerError;

/// A data frame normalized for handler consumption.
///
/// `payload` is still the raw JSON event string; the matched handler pays
/// the decode cost via [`InboundEvent::decode_payload`].
#[derive(Debug, Clone)]
pub struct InboundEvent<I> {
    /// Server-assigned delivery identifier, if present.
    pub id: Option<String>,
    /// Channel the frame arrived on.
    pub channel: String,
    /// JSON-encoded domain payload.
    pub payload: String,
    /// Local receipt time.
    pub received_at: I,
}

impl<I> InboundEvent<I> {
    /// Decode the payload into a domain type.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_str(&self.payload).map_err(|e| {
            HandlerError::Decode(ProtocolError::MalformedPayload {
                channel: self.channel.clone(),
                reason: e.to_string(),
            })
        })
    }
}

/// Domain events routed out of the session's channel handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A message was created server-side (the authoritative echo).
    MessageCreated(MessageRecord),
    /// A room was created or updated.
    RoomUpserted(RoomRecord),
}

/// Requests the session issues to the external request/response API.
///
/// The wire encoding is the driver's concern; the session only models the
/// request/response semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    /// One-shot message page load for a room.
    LoadMessages {
        /// Room to load.
        room_id: String,
        /// Load generation; echo back via `complete_message_load` so
        /// responses that outlive a room switch are discarded.
        generation: u64,
    },

    /// Confirm a message send.
    SendMessage {
        /// Target room.
        room_id: String,
        /// Correlation id of the optimistic entry this send confirms.
        temp_id: u64,
        /// Message text.
        content: String,
    },

    /// One-shot room list load.
    LoadRooms {
        /// Owner of the room list.
        user_id: String,
    },

    /// Create a group room.
    CreateGroup {
        /// Display name.
        name: String,
        /// Initial members.
        member_ids: Vec<String>,
    },

    /// Create (or fetch) a direct room with another user.
    CreateDirect {
        /// The other participant.
        target_user_id: String,
    },
}

/// User-visible conditions surfaced by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// A send confirmation failed; the optimistic entry was rolled back.
    SendFailed {
        /// Room the send targeted.
        room_id: String,
        /// Failure description from the API's error payload.
        reason: String,
    },

    /// A room creation request failed; nothing was inserted.
    CreateFailed {
        /// Failure description from the API's error payload.
        reason: String,
    },

    /// The transport retry policy is exhausted; the driver decides whether
    /// to surface this or keep retrying at a slower cadence.
    TransportUnavailable,
}

/// Actions produced by the session for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open the physical transport connection.
    Dial,

    /// Write this frame to the open connection.
    Transmit(String),

    /// Issue a request against the request/response API.
    Request(ApiRequest),

    /// Surface a user-visible condition.
    Notify(SessionNotice),

    /// Tick the session after this delay (reconnect backoff).
    ScheduleTick {
        /// Delay before the next tick.
        delay: Duration,
    },
}
