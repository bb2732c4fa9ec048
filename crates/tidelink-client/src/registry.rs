//! Subscription registry.
//!
//! Multiplexes logical topics over the single transport channel and
//! survives reconnects transparently to callers: registrations live here,
//! so after a reconnect [`SubscriptionRegistry::resubscribe_frames`]
//! replays a subscribe frame for every still-registered channel.
//!
//! Channels are singleton topics in this design; registering a second
//! handler for the same channel name replaces the first (last-registered
//! wins). Dispatch is isolated: a failure inside one handler is logged at
//! the boundary and never corrupts registry state or delivery on other
//! channels.

use std::collections::HashMap;

use tidelink_proto::{ClientFrame, Envelope, FrameKind};

use crate::{error::HandlerError, event::InboundEvent};

/// Channel handler: consumes a normalized event, optionally routing a
/// decoded value `R` back to the dispatcher's caller.
pub type Handler<I, R> = Box<dyn FnMut(InboundEvent<I>) -> Result<Option<R>, HandlerError> + Send>;

/// Opaque subscription identifier. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// One active channel registration.
struct ChannelSlot<I, R> {
    owner: SubscriptionId,
    handler: Handler<I, R>,
}

/// Maps logical channel names to local handlers.
///
/// Generic over the instant type `I` (stamped onto inbound events) and the
/// routed output type `R` handlers may produce.
pub struct SubscriptionRegistry<I, R> {
    next_id: u64,
    /// Every live subscription id and the channel it was issued for.
    subscriptions: HashMap<SubscriptionId, String>,
    /// One active handler per channel; last-registered wins.
    handlers: HashMap<String, ChannelSlot<I, R>>,
}

impl<I, R> SubscriptionRegistry<I, R> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { next_id: 0, subscriptions: HashMap::new(), handlers: HashMap::new() }
    }

    /// Register a handler for a channel.
    ///
    /// Returns the subscription id and the subscribe frame to transmit.
    /// The caller sends the frame if the channel is connected; otherwise
    /// the registration alone suffices, because the reconnect hook replays
    /// subscribe frames for every registered channel.
    pub fn subscribe(&mut self, channel: &str, handler: Handler<I, R>) -> (SubscriptionId, String) {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);

        self.subscriptions.insert(id, channel.to_string());
        self.handlers.insert(channel.to_string(), ChannelSlot { owner: id, handler });

        (id, ClientFrame::Subscribe { channel: channel.to_string() }.encode())
    }

    /// Remove a subscription.
    ///
    /// Local registration is removed unconditionally so no further
    /// callbacks fire. Returns the unsubscribe frame for best-effort
    /// transmission, or `None` if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<String> {
        let channel = self.subscriptions.remove(&id)?;

        // Only drop the handler if this id still owns the channel; a
        // later subscribe to the same channel superseded it otherwise.
        if self.handlers.get(&channel).is_some_and(|slot| slot.owner == id) {
            self.handlers.remove(&channel);
        }

        Some(ClientFrame::Unsubscribe { channel }.encode())
    }

    /// Subscribe frames for every still-registered channel.
    ///
    /// Invoked on the transport channel's `Resubscribe` action so the full
    /// batch precedes delivery of any post-reconnect inbound event. Order
    /// between distinct channels is arbitrary.
    pub fn resubscribe_frames(&self) -> Vec<String> {
        self.handlers
            .keys()
            .map(|channel| ClientFrame::Subscribe { channel: channel.clone() }.encode())
            .collect()
    }

    /// Number of channels with an active handler.
    pub fn channel_count(&self) -> usize {
        self.handlers.len()
    }

    /// Whether a channel has an active handler.
    pub fn has_channel(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }

    /// Decode a raw inbound frame and route it to its channel handler.
    ///
    /// Absorbs everything that is not a routable data frame: malformed
    /// envelopes, acks, server error frames, frames for channels with no
    /// handler (e.g. late arrivals after a synchronous unsubscribe), and
    /// handler failures. None of these propagate to the caller.
    pub fn dispatch(&mut self, raw: &str, received_at: I) -> Option<R> {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed inbound frame");
                return None;
            },
        };

        match envelope.kind {
            FrameKind::ConnectionAck => {
                tracing::debug!("connection acknowledged");
                return None;
            },
            FrameKind::Error => {
                tracing::warn!(event = ?envelope.event, "server error frame");
                return None;
            },
            FrameKind::Data => {},
        }

        let Some(channel) = envelope.channel else {
            tracing::warn!("dropping data frame without channel");
            return None;
        };

        let Some(slot) = self.handlers.get_mut(&channel) else {
            tracing::debug!(channel, "dropping event for unsubscribed channel");
            return None;
        };

        let event = InboundEvent {
            id: envelope.id,
            channel: channel.clone(),
            payload: envelope.event.unwrap_or_default(),
            received_at,
        };

        match (slot.handler)(event) {
            Ok(routed) => routed,
            Err(e) => {
                tracing::warn!(channel, error = %e, "handler failed; event dropped");
                None
            },
        }
    }
}

impl<I, R> Default for SubscriptionRegistry<I, R> {
    fn default() -> Self {
        Self::new()
    }
}
