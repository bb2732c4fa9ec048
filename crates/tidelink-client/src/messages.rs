//! Message reconciliation store.
//!
//! Produces a single, deduplicated, time-ordered message list per room
//! that is safe to render directly, bridging optimistic local writes and
//! authoritative remote confirmations.
//!
//! # Invariants
//!
//! - Within a room, entries are kept in non-decreasing `created_at` order;
//!   optimistic entries append at the tail at insertion time.
//! - An authoritative id appears at most once per room (duplicate delivery
//!   is absorbed silently).
//! - Optimistic entries are removed, not relabeled, once the matching
//!   confirmed entry arrives or the send fails.
//! - A room's log never exceeds the cap; eviction is from the head,
//!   independent of optimistic/confirmed status.
//!
//! # Reconciliation
//!
//! An echo event authored by the local user normally removes exactly one
//! optimistic entry: the one its authoritative id was correlated to via
//! [`MessageStore::record_confirmation`]. When the echo beats the
//! confirmation response and no correlation is known yet, all outstanding
//! optimistic entries for the room are collapsed instead, which matches
//! the serialized-sends case.

use std::{collections::HashMap, fmt};

use tidelink_proto::MessageRecord;

/// Locally generated identifier for an optimistic entry.
pub type TempId = u64;

/// Default per-room log bound.
pub const DEFAULT_ROOM_CAP: usize = 1000;

/// Message identity: authoritative once confirmed, local until then.
///
/// The two spaces can never collide; temp ids render with a `temp-`
/// prefix and are never reused within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Server-assigned identifier.
    Confirmed(String),
    /// Locally assigned identifier for an optimistic entry.
    Temp(TempId),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed(id) => f.write_str(id),
            Self::Temp(n) => write!(f, "temp-{n}"),
        }
    }
}

/// One row of a room's rendered message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    /// Message identity.
    pub id: MessageId,
    /// Room the message belongs to.
    pub room_id: String,
    /// Author's user identifier.
    pub author_id: String,
    /// Message text.
    pub content: String,
    /// Send time, milliseconds since the Unix epoch. Local clock time for
    /// optimistic entries; replaced wholesale when the confirmed entry
    /// arrives.
    pub created_at: u64,
    /// Entry is awaiting server confirmation.
    pub is_optimistic: bool,
}

impl MessageEntry {
    fn from_record(record: &MessageRecord) -> Self {
        Self {
            id: MessageId::Confirmed(record.id.clone()),
            room_id: record.room_id.clone(),
            author_id: record.author_id.clone(),
            content: record.content.clone(),
            created_at: record.created_at,
            is_optimistic: false,
        }
    }
}

#[derive(Default)]
struct RoomLog {
    entries: Vec<MessageEntry>,
    /// Authoritative id -> the optimistic entry it supersedes. Populated
    /// by confirmation responses, consumed by the echo event.
    confirmations: HashMap<String, TempId>,
}

impl RoomLog {
    fn contains_confirmed(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(&e.id, MessageId::Confirmed(existing) if existing == id))
    }

    fn remove_temp(&mut self, temp_id: TempId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != MessageId::Temp(temp_id));
        self.entries.len() != before
    }

    /// Insert keeping `created_at` non-decreasing; equal timestamps keep
    /// arrival order.
    fn insert_sorted(&mut self, entry: MessageEntry) {
        let at = self.entries.partition_point(|e| e.created_at <= entry.created_at);
        self.entries.insert(at, entry);
    }

    fn enforce_cap(&mut self, cap: usize) {
        if self.entries.len() > cap {
            let excess = self.entries.len() - cap;
            self.entries.drain(..excess);
        }
    }
}

/// Per-room ordered message logs for one session.
///
/// Owned exclusively by the active chat session; discarded wholesale when
/// the session ends.
pub struct MessageStore {
    logs: HashMap<String, RoomLog>,
    cap: usize,
    next_temp: TempId,
    /// Room-switch generation counter; a completed load only applies if it
    /// is still the most recent one started.
    load_generation: u64,
}

impl MessageStore {
    /// Create a store with the default per-room cap.
    pub fn new() -> Self {
        Self::with_cap(DEFAULT_ROOM_CAP)
    }

    /// Create a store with an explicit per-room cap.
    pub fn with_cap(cap: usize) -> Self {
        Self { logs: HashMap::new(), cap, next_temp: 0, load_generation: 0 }
    }

    /// Rendered log for a room, `created_at`-ascending. Empty if the room
    /// was never loaded.
    pub fn entries(&self, room_id: &str) -> &[MessageEntry] {
        self.logs.get(room_id).map_or(&[], |log| &log.entries)
    }

    /// Number of outstanding optimistic entries for a room.
    pub fn optimistic_count(&self, room_id: &str) -> usize {
        self.entries(room_id).iter().filter(|e| e.is_optimistic).count()
    }

    /// Start a one-shot initial load.
    ///
    /// Returns the generation to thread through the request; a response
    /// for a superseded generation is discarded on arrival.
    pub fn begin_load(&mut self) -> u64 {
        self.load_generation += 1;
        self.load_generation
    }

    /// Complete an initial load, replacing the room's log wholesale.
    ///
    /// Returns `false` when the response is stale (a newer load started
    /// since), in which case nothing changes.
    pub fn complete_load(
        &mut self,
        room_id: &str,
        generation: u64,
        records: &[MessageRecord],
    ) -> bool {
        if generation != self.load_generation {
            tracing::debug!(room_id, generation, "discarding stale initial load");
            return false;
        }

        let mut log = RoomLog {
            entries: records.iter().map(MessageEntry::from_record).collect(),
            confirmations: HashMap::new(),
        };
        log.enforce_cap(self.cap);
        self.logs.insert(room_id.to_string(), log);
        true
    }

    /// Append an optimistic entry at the tail and return its temp id.
    ///
    /// Temp ids are never reused within a store.
    pub fn push_optimistic(
        &mut self,
        room_id: &str,
        author_id: &str,
        content: &str,
        created_at: u64,
    ) -> TempId {
        self.next_temp += 1;
        let temp_id = self.next_temp;

        let log = self.logs.entry(room_id.to_string()).or_default();
        log.entries.push(MessageEntry {
            id: MessageId::Temp(temp_id),
            room_id: room_id.to_string(),
            author_id: author_id.to_string(),
            content: content.to_string(),
            created_at,
            is_optimistic: true,
        });
        log.enforce_cap(self.cap);

        temp_id
    }

    /// Remove a specific optimistic entry (confirmation failure).
    ///
    /// Returns whether an entry was removed.
    pub fn rollback(&mut self, room_id: &str, temp_id: TempId) -> bool {
        let Some(log) = self.logs.get_mut(room_id) else {
            return false;
        };

        log.confirmations.retain(|_, t| *t != temp_id);
        log.remove_temp(temp_id)
    }

    /// Correlate a confirmation response with its optimistic entry.
    ///
    /// If the echo event already arrived (the confirmed id is in the log),
    /// the optimistic entry is removed immediately; otherwise the mapping
    /// waits for the echo.
    pub fn record_confirmation(&mut self, room_id: &str, temp_id: TempId, message_id: &str) {
        let Some(log) = self.logs.get_mut(room_id) else {
            return;
        };

        if log.contains_confirmed(message_id) {
            log.remove_temp(temp_id);
        } else {
            log.confirmations.insert(message_id.to_string(), temp_id);
        }
    }

    /// Merge an authoritative message-created event into the room's log.
    ///
    /// Returns whether the event was inserted (`false` for duplicates).
    pub fn apply_created(&mut self, record: &MessageRecord, local_user: &str) -> bool {
        let log = self.logs.entry(record.room_id.clone()).or_default();

        // Duplicate delivery: absorb silently.
        if log.contains_confirmed(&record.id) {
            return false;
        }

        if let Some(temp_id) = log.confirmations.remove(&record.id) {
            log.remove_temp(temp_id);
        } else if record.author_id == local_user {
            // Echo beat the confirmation response; collapse every
            // outstanding optimistic entry for this room.
            log.entries.retain(|e| !e.is_optimistic);
        }

        log.insert_sorted(MessageEntry::from_record(record));
        log.enforce_cap(self.cap);
        true
    }

    /// Drop a room's log entirely (room view torn down).
    pub fn drop_room(&mut self, room_id: &str) {
        self.logs.remove(room_id);
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(id: &str, room: &str, author: &str, content: &str, at: u64) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            room_id: room.to_string(),
            author_id: author.to_string(),
            content: content.to_string(),
            created_at: at,
        }
    }

    #[test]
    fn duplicate_event_ids_are_absorbed() {
        let mut store = MessageStore::new();
        let rec = record("m1", "r1", "alice", "hi", 10);

        assert!(store.apply_created(&rec, "me"));
        assert!(!store.apply_created(&rec, "me"));
        assert_eq!(store.entries("r1").len(), 1);
    }

    #[test]
    fn optimistic_send_then_echo_leaves_one_confirmed_entry() {
        let mut store = MessageStore::new();
        let temp = store.push_optimistic("r1", "me", "hi", 100);

        assert_eq!(store.entries("r1").len(), 1);
        assert!(store.entries("r1")[0].is_optimistic);
        assert_eq!(store.entries("r1")[0].id.to_string(), format!("temp-{temp}"));

        store.record_confirmation("r1", temp, "m1");
        store.apply_created(&record("m1", "r1", "me", "hi", 105), "me");

        let entries = store.entries("r1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, MessageId::Confirmed("m1".to_string()));
        assert!(!entries[0].is_optimistic);
        assert_eq!(store.optimistic_count("r1"), 0);
    }

    #[test]
    fn echo_before_confirmation_response_collapses_optimistic_entries() {
        let mut store = MessageStore::new();
        let temp = store.push_optimistic("r1", "me", "hi", 100);

        // Echo arrives before send_succeeded: no correlation known yet.
        store.apply_created(&record("m1", "r1", "me", "hi", 105), "me");
        assert_eq!(store.entries("r1").len(), 1);
        assert_eq!(store.optimistic_count("r1"), 0);

        // The late confirmation response is then a no-op.
        store.record_confirmation("r1", temp, "m1");
        assert_eq!(store.entries("r1").len(), 1);
    }

    #[test]
    fn correlated_echo_removes_only_the_matched_entry() {
        let mut store = MessageStore::new();
        let first = store.push_optimistic("r1", "me", "one", 100);
        let second = store.push_optimistic("r1", "me", "two", 101);

        store.record_confirmation("r1", first, "m1");
        store.apply_created(&record("m1", "r1", "me", "one", 99), "me");

        // The second in-flight send is untouched.
        let entries = store.entries("r1");
        assert_eq!(entries.len(), 2);
        assert_eq!(store.optimistic_count("r1"), 1);
        assert!(entries.iter().any(|e| e.id == MessageId::Temp(second)));
    }

    #[test]
    fn rollback_restores_pre_send_state() {
        let mut store = MessageStore::new();
        store.apply_created(&record("m0", "r1", "alice", "before", 10), "me");
        let baseline: Vec<_> = store.entries("r1").to_vec();

        let temp = store.push_optimistic("r1", "me", "doomed", 100);
        assert_eq!(store.entries("r1").len(), 2);

        assert!(store.rollback("r1", temp));
        assert_eq!(store.entries("r1"), baseline.as_slice());

        // Second rollback is a no-op.
        assert!(!store.rollback("r1", temp));
    }

    #[test]
    fn confirmed_entries_insert_in_created_at_order() {
        let mut store = MessageStore::new();
        store.apply_created(&record("m2", "r1", "a", "second", 20), "me");
        store.apply_created(&record("m1", "r1", "a", "first", 10), "me");
        store.apply_created(&record("m3", "r1", "a", "third", 30), "me");

        let times: Vec<u64> = store.entries("r1").iter().map(|e| e.created_at).collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let mut store = MessageStore::with_cap(3);
        for i in 0..5 {
            store.apply_created(&record(&format!("m{i}"), "r1", "a", "x", i), "me");
        }

        let ids: Vec<String> = store.entries("r1").iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn cap_evicts_regardless_of_optimistic_status() {
        let mut store = MessageStore::with_cap(2);
        store.push_optimistic("r1", "me", "old", 1);
        store.apply_created(&record("m1", "r1", "a", "x", 2), "me");
        store.apply_created(&record("m2", "r1", "a", "y", 3), "me");

        // The optimistic entry was at the head and is evicted.
        assert_eq!(store.optimistic_count("r1"), 0);
        assert_eq!(store.entries("r1").len(), 2);
    }

    #[test]
    fn stale_load_is_discarded() {
        let mut store = MessageStore::new();

        let gen_a = store.begin_load(); // room A load in flight
        let gen_b = store.begin_load(); // switched to room B

        assert!(store.complete_load("b", gen_b, &[record("m1", "b", "x", "in b", 1)]));

        // Room A's response arrives late: discarded, B unaffected.
        assert!(!store.complete_load("a", gen_a, &[record("m9", "a", "x", "stale", 1)]));
        assert!(store.entries("a").is_empty());
        assert_eq!(store.entries("b").len(), 1);
    }

    #[test]
    fn load_replaces_existing_log_and_outstanding_state() {
        let mut store = MessageStore::new();
        let temp = store.push_optimistic("r1", "me", "hi", 100);
        store.record_confirmation("r1", temp, "m9");

        let generation = store.begin_load();
        assert!(store.complete_load("r1", generation, &[record("m1", "r1", "a", "x", 1)]));

        assert_eq!(store.entries("r1").len(), 1);
        assert_eq!(store.optimistic_count("r1"), 0);

        // The stale correlation must not resurrect anything.
        assert!(store.apply_created(&record("m9", "r1", "me", "hi", 200), "me"));
        assert_eq!(store.entries("r1").len(), 2);
    }

    #[test]
    fn temp_ids_are_never_reused() {
        let mut store = MessageStore::new();
        let a = store.push_optimistic("r1", "me", "a", 1);
        store.rollback("r1", a);
        let b = store.push_optimistic("r1", "me", "b", 2);
        assert_ne!(a, b);
    }
}
