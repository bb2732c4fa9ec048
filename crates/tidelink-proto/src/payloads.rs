//! Domain payload types.
//!
//! These are the JSON bodies nested inside data envelopes and returned by
//! the request/response API. Field names follow the server's camelCase
//! convention.

use serde::{Deserialize, Serialize};

/// Room classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// Multi-member group room.
    Group,
    /// Two-party direct room.
    Direct,
}

/// An authoritative message, as delivered by the initial page load and by
/// message-created events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Server-assigned message identifier.
    pub id: String,
    /// Room the message belongs to.
    pub room_id: String,
    /// Author's user identifier.
    pub author_id: String,
    /// Message text.
    pub content: String,
    /// Server-assigned send time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

/// A room row, as delivered by the room-list load, creation responses, and
/// room upsert events.
///
/// Live upsert events do not always carry `kind`; consumers preserve any
/// locally-known classification when it is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    /// Unique room identifier.
    pub room_id: String,
    /// Display name.
    pub name: String,
    /// Current member count.
    pub member_count: u32,
    /// Timestamp of the most recent message, milliseconds since the Unix
    /// epoch. Zero for rooms with no messages yet.
    #[serde(default)]
    pub last_message_at: u64,
    /// Room classification. `None` when the event omits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RoomKind>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn room_record_tolerates_missing_kind_and_timestamp() {
        let raw = r#"{"roomId":"r9","name":"design","memberCount":4}"#;
        let room: RoomRecord = serde_json::from_str(raw).unwrap();

        assert_eq!(room.room_id, "r9");
        assert_eq!(room.member_count, 4);
        assert_eq!(room.last_message_at, 0);
        assert!(room.kind.is_none());
    }

    #[test]
    fn room_kind_uses_lowercase_tags() {
        let raw = r#"{"roomId":"r1","name":"a","memberCount":2,"kind":"direct"}"#;
        let room: RoomRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(room.kind, Some(RoomKind::Direct));
    }
}
