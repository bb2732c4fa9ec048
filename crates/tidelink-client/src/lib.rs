//! State reconciliation engine for the Tidelink chat client.
//!
//! Everything the chat UI renders in real time flows through this crate:
//! the [`SubscriptionRegistry`] multiplexes logical channels over the single
//! transport connection, the [`MessageStore`] merges optimistic local sends
//! with authoritative remote events, and the [`RoomDirectory`] keeps the
//! sidebar room list consistent under live upserts. [`ChatSession`] ties
//! them together for one logged-in user.
//!
//! All protocol logic is sans-IO: operations return [`SessionAction`]
//! values for a driver to execute, so the same code runs against a real
//! WebSocket (the optional `transport` feature) and in deterministic tests.

mod error;
mod event;
mod messages;
mod registry;
mod rooms;
mod session;

#[cfg(feature = "transport")]
pub mod transport;

pub use error::{HandlerError, SessionError};
pub use event::{ApiRequest, InboundEvent, SessionAction, SessionNotice, SyncEvent};
pub use messages::{DEFAULT_ROOM_CAP, MessageEntry, MessageId, MessageStore, TempId};
pub use registry::{Handler, SubscriptionId, SubscriptionRegistry};
pub use rooms::RoomDirectory;
pub use session::ChatSession;
