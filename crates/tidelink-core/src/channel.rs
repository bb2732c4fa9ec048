//! Transport channel state machine.
//!
//! Maintains exactly one logical duplex connection to the real-time
//! endpoint, with transparent reconnection and outbound buffering. Uses the
//! action pattern: methods take time as input and return actions for the
//! driver to execute. This keeps the state machine pure (no I/O) and makes
//! testing straightforward.
//!
//! # State Machine
//!
//! ```text
//! ┌──────────────┐  connect()  ┌────────────┐  on_open()  ┌───────────┐
//! │ Disconnected │────────────>│ Connecting │────────────>│ Connected │
//! └──────────────┘             └────────────┘             └───────────┘
//!        ↑                           │                          │
//!        │      on_close() / dial failure, retried per backoff  │
//!        └───────────────────────────┴──────────────────────────┘
//! ```
//!
//! On the transition to `Connected` the channel emits
//! [`ChannelAction::Resubscribe`] before flushing any buffered sends, so
//! subscription replay completes logically atomically with the transition
//! and no inbound event for a not-yet-resubscribed channel is dropped by
//! the layer above.

use std::{collections::VecDeque, ops::Sub, time::Duration};

use crate::error::ChannelError;

/// Initial reconnect delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Connection attempts before the channel reports itself unavailable.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Actions returned by the channel state machine.
///
/// The driver executes these: `Dial` opens the physical connection,
/// `Transmit` writes one text frame, `Resubscribe` hands control to the
/// subscription registry so it can replay subscribe frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelAction {
    /// Open the physical connection.
    Dial,

    /// Write this frame to the open connection.
    Transmit(String),

    /// Replay subscription frames now; emitted first on every transition
    /// to `Connected`, before buffered application traffic is flushed.
    Resubscribe,

    /// A reconnect attempt was scheduled; the driver should tick the
    /// channel once the delay has elapsed.
    RetryScheduled {
        /// Failed attempts so far this connection cycle.
        attempt: u32,
        /// Delay before the next dial.
        delay: Duration,
    },

    /// The retry policy is exhausted. No further dials happen until an
    /// explicit `connect()`.
    Unavailable,
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No connection, and none in progress.
    Disconnected,
    /// Dial issued, waiting for the transport to open.
    Connecting,
    /// Connection open; frames flow directly.
    Connected,
}

/// Reconnect policy configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// First retry delay; doubles per failed attempt.
    pub base_delay: Duration,
    /// Cap on the retry delay.
    pub max_delay: Duration,
    /// Failed attempts tolerated before reporting `Unavailable`.
    pub max_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Pending reconnect bookkeeping.
#[derive(Debug, Clone, Copy)]
struct RetryState<I> {
    /// When the connection went down.
    down_since: I,
    /// How long to wait before the next dial.
    delay: Duration,
}

/// Transport channel state machine.
///
/// Exactly one instance exists per session. This is a pure state machine:
/// no I/O, no Environment storage. Time is passed as a parameter to the
/// methods that need it.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct TransportChannel<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Current state.
    state: ChannelState,
    /// Configuration.
    config: ChannelConfig,
    /// Outbound frames buffered while not connected, FIFO.
    pending_sends: VecDeque<String>,
    /// Failed attempts this connection cycle. Reset on open.
    attempts: u32,
    /// Scheduled reconnect, if any.
    retry: Option<RetryState<I>>,
}

impl<I> TransportChannel<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a channel in [`ChannelState::Disconnected`].
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            state: ChannelState::Disconnected,
            config,
            pending_sends: VecDeque::new(),
            attempts: 0,
            retry: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Number of buffered outbound frames.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending_sends.len()
    }

    /// Failed attempts this connection cycle.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.attempts
    }

    /// Begin a fresh connection cycle.
    ///
    /// Resets the attempt counter, so an explicit `connect()` always
    /// restarts a channel that previously reported `Unavailable`.
    ///
    /// # Errors
    ///
    /// - `ChannelError::InvalidState` if not in `Disconnected` state
    pub fn connect(&mut self) -> Result<Vec<ChannelAction>, ChannelError> {
        if self.state != ChannelState::Disconnected {
            return Err(ChannelError::InvalidState {
                state: self.state,
                operation: "connect".to_string(),
            });
        }

        self.state = ChannelState::Connecting;
        self.attempts = 0;
        self.retry = None;

        Ok(vec![ChannelAction::Dial])
    }

    /// The transport reported an open connection.
    ///
    /// Emits `Resubscribe` first, then flushes buffered frames in FIFO
    /// order. Spurious opens in other states are ignored.
    pub fn on_open(&mut self) -> Vec<ChannelAction> {
        if self.state != ChannelState::Connecting {
            tracing::debug!(state = ?self.state, "ignoring spurious transport open");
            return vec![];
        }

        self.state = ChannelState::Connected;
        self.attempts = 0;
        self.retry = None;

        let mut actions = vec![ChannelAction::Resubscribe];
        actions.extend(self.pending_sends.drain(..).map(ChannelAction::Transmit));
        actions
    }

    /// The transport closed or the dial failed.
    ///
    /// Schedules a retry per the backoff policy, or reports `Unavailable`
    /// once the attempt budget is spent. Buffered frames are kept; they
    /// flush after the next successful open.
    pub fn on_close(&mut self, now: I, reason: &str) -> Vec<ChannelAction> {
        if self.state == ChannelState::Disconnected {
            return vec![];
        }

        self.state = ChannelState::Disconnected;
        self.attempts += 1;

        if self.attempts >= self.config.max_attempts {
            tracing::warn!(attempts = self.attempts, reason, "transport unavailable");
            self.retry = None;
            return vec![ChannelAction::Unavailable];
        }

        let delay = self.backoff_delay(self.attempts);
        tracing::debug!(attempt = self.attempts, ?delay, reason, "transport closed, will retry");
        self.retry = Some(RetryState { down_since: now, delay });

        vec![ChannelAction::RetryScheduled { attempt: self.attempts, delay }]
    }

    /// Process periodic maintenance: issues the scheduled dial once its
    /// delay has elapsed.
    pub fn tick(&mut self, now: I) -> Vec<ChannelAction> {
        if self.state != ChannelState::Disconnected {
            return vec![];
        }

        let Some(retry) = self.retry else {
            return vec![];
        };

        if now - retry.down_since < retry.delay {
            return vec![];
        }

        self.retry = None;
        self.state = ChannelState::Connecting;
        vec![ChannelAction::Dial]
    }

    /// Send a frame, buffering it when not connected.
    ///
    /// Buffered frames flush in FIFO order on the next open, after
    /// subscription replay.
    pub fn send(&mut self, frame: String) -> Vec<ChannelAction> {
        if self.state == ChannelState::Connected {
            vec![ChannelAction::Transmit(frame)]
        } else {
            self.pending_sends.push_back(frame);
            vec![]
        }
    }

    /// Tear the channel down explicitly (logout/unmount).
    ///
    /// Drops buffered frames and any scheduled retry.
    pub fn shutdown(&mut self) {
        self.state = ChannelState::Disconnected;
        self.pending_sends.clear();
        self.attempts = 0;
        self.retry = None;
    }

    /// Exponential backoff: `base * 2^(attempt-1)`, capped at `max_delay`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.config.base_delay.saturating_mul(1_u32 << exp);
        delay.min(self.config.max_delay)
    }
}

impl<I> Default for TransportChannel<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}
