//! Wire types for the Tidelink real-time sync protocol.
//!
//! The real-time transport is a publish/subscribe WebSocket carrying
//! JSON-encoded event envelopes. This crate defines:
//!
//! - [`Envelope`]: the inbound frame `{type, id, channel, event}` where
//!   `event` is itself a JSON string holding the domain payload
//! - [`ClientFrame`]: outbound subscribe/unsubscribe frames
//! - Domain payloads: [`MessageRecord`] and [`RoomRecord`]
//!
//! Parsing is strict at the envelope layer and lazy at the payload layer:
//! the dispatch loop routes on `channel` without touching the inner event
//! string, and only the matched handler pays the second decode.

mod envelope;
mod errors;
mod payloads;

pub use envelope::{ClientFrame, Envelope, FrameKind, message_channel, room_directory_channel};
pub use errors::{ProtocolError, Result};
pub use payloads::{MessageRecord, RoomKind, RoomRecord};
