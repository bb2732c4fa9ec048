//! Event envelope encoding and decoding.
//!
//! Every inbound WebSocket text frame is one [`Envelope`]. The `type` field
//! distinguishes connection acknowledgement, data delivery, and error
//! frames; only data frames carry a channel name and an event body. The
//! event body is a nested JSON string so the envelope can be routed without
//! deserializing the domain payload.
//!
//! # Invariants
//!
//! - Decoding an envelope never panics; malformed input yields
//!   [`ProtocolError::MalformedEnvelope`].
//! - [`Envelope::payload`] is the only place the inner event string is
//!   parsed; routing logic reads `channel` only.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Frame classification carried in the envelope `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Server acknowledged the connection handshake.
    ConnectionAck,
    /// A domain event delivered on a subscribed channel.
    Data,
    /// A server-side error report.
    Error,
}

/// Inbound event envelope.
///
/// `id` is the server-assigned delivery identifier, used by consumers for
/// duplicate detection; the transport may deliver the same envelope twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Frame classification.
    #[serde(rename = "type")]
    pub kind: FrameKind,

    /// Server-assigned delivery identifier. Absent on acks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Logical channel the frame was published on. Absent on acks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// JSON-encoded domain payload. Absent on acks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl Envelope {
    /// Decode an envelope from raw frame text.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedEnvelope { reason: e.to_string() })
    }

    /// Channel name of a data frame.
    pub fn channel(&self) -> Result<&str> {
        self.channel.as_deref().ok_or(ProtocolError::MissingChannel)
    }

    /// Decode the nested event body into a domain payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let channel = self.channel.clone().unwrap_or_default();
        let event = self.event.as_deref().ok_or(ProtocolError::MissingEvent)?;

        serde_json::from_str(event)
            .map_err(|e| ProtocolError::MalformedPayload { channel, reason: e.to_string() })
    }
}

/// Outbound frames sent by the client.
///
/// Encoding is infallible: frames are built with `serde_json::json!` so
/// there is no serializer error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Start receiving events for a channel.
    Subscribe {
        /// Logical channel name.
        channel: String,
    },
    /// Stop receiving events for a channel.
    Unsubscribe {
        /// Logical channel name.
        channel: String,
    },
}

impl ClientFrame {
    /// Encode this frame as JSON text.
    pub fn encode(&self) -> String {
        match self {
            Self::Subscribe { channel } => {
                serde_json::json!({ "type": "subscribe", "channel": channel }).to_string()
            },
            Self::Unsubscribe { channel } => {
                serde_json::json!({ "type": "unsubscribe", "channel": channel }).to_string()
            },
        }
    }
}

/// Channel carrying message-created events for one room.
pub fn message_channel(room_id: &str) -> String {
    format!("room:{room_id}:messages")
}

/// Channel carrying room upsert events for one user's directory.
pub fn room_directory_channel(user_id: &str) -> String {
    format!("user:{user_id}:rooms")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::payloads::MessageRecord;

    #[test]
    fn decode_data_envelope() {
        let event =
            r#"{"id":"m1","roomId":"r1","authorId":"u1","content":"hi","createdAt":42}"#;
        let raw = serde_json::json!({
            "type": "data",
            "id": "d1",
            "channel": "room:r1:messages",
            "event": event,
        })
        .to_string();

        let envelope = Envelope::decode(&raw).unwrap();
        assert_eq!(envelope.kind, FrameKind::Data);
        assert_eq!(envelope.channel().unwrap(), "room:r1:messages");

        let record: MessageRecord = envelope.payload().unwrap();
        assert_eq!(record.id, "m1");
        assert_eq!(record.room_id, "r1");
        assert_eq!(record.created_at, 42);
    }

    #[test]
    fn decode_connection_ack_without_channel() {
        let envelope = Envelope::decode(r#"{"type":"connection_ack"}"#).unwrap();
        assert_eq!(envelope.kind, FrameKind::ConnectionAck);
        assert!(matches!(envelope.channel(), Err(ProtocolError::MissingChannel)));
    }

    #[test]
    fn decode_garbage_is_an_error_not_a_panic() {
        assert!(matches!(
            Envelope::decode("{nope"),
            Err(ProtocolError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn payload_with_wrong_shape_reports_channel() {
        let raw = r#"{"type":"data","id":"d1","channel":"room:r1:messages","event":"[1,2]"}"#;
        let envelope = Envelope::decode(raw).unwrap();

        let result: Result<MessageRecord> = envelope.payload();
        assert!(matches!(
            result,
            Err(ProtocolError::MalformedPayload { channel, .. }) if channel == "room:r1:messages"
        ));
    }

    #[test]
    fn subscribe_frame_roundtrips_as_json() {
        let frame = ClientFrame::Subscribe { channel: message_channel("r1") };
        let value: serde_json::Value = serde_json::from_str(&frame.encode()).unwrap();

        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["channel"], "room:r1:messages");
    }
}
