//! Room directory store.
//!
//! Keeps the sidebar-level room list consistent under concurrent creation
//! and live-update events. The list has recency semantics: any upsert
//! promotes the room to the front, except the initial bulk load, which
//! preserves server-provided order.
//!
//! # Invariants
//!
//! - `room_id` is unique within the list.
//! - A locally-known `kind` classification survives upserts that omit it
//!   (live events do not always carry `kind`).

use tidelink_proto::RoomRecord;

/// Ordered collection of rooms for the current user.
///
/// Owned exclusively by the active chat session; discarded wholesale when
/// the session ends.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: Vec<RoomRecord>,
}

impl RoomDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current room list, most-recently-updated first (after the initial
    /// load order).
    pub fn rooms(&self) -> &[RoomRecord] {
        &self.rooms
    }

    /// Look up a room by id.
    pub fn get(&self, room_id: &str) -> Option<&RoomRecord> {
        self.rooms.iter().find(|r| r.room_id == room_id)
    }

    /// Replace the whole collection with the initial bulk load,
    /// preserving server-provided order.
    pub fn replace_all(&mut self, rooms: Vec<RoomRecord>) {
        self.rooms = rooms;
    }

    /// Merge a live upsert event.
    ///
    /// Unknown rooms are inserted at the front. Known rooms are updated in
    /// place (preserving a locally-known `kind` when the incoming event
    /// omits it) and promoted to the front.
    pub fn upsert(&mut self, mut incoming: RoomRecord) {
        if let Some(at) = self.rooms.iter().position(|r| r.room_id == incoming.room_id) {
            let existing = self.rooms.remove(at);
            if incoming.kind.is_none() {
                incoming.kind = existing.kind;
            }
        }
        self.rooms.insert(0, incoming);
    }

    /// Drop every room (logout).
    pub fn clear(&mut self) {
        self.rooms.clear();
    }
}
