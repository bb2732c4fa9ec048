//! Property-based tests for the transport channel state machine.
//!
//! Verifies that channel invariants hold under arbitrary event sequences:
//! the retry delay is always bounded, buffered frames are never lost while
//! disconnected, and the machine never panics or wedges.

#![allow(clippy::unwrap_used)]

use std::time::{Duration, Instant};

use proptest::prelude::*;
use tidelink_core::{ChannelAction, ChannelConfig, ChannelState, TransportChannel};

#[derive(Debug, Clone)]
enum Event {
    Connect,
    Open,
    Close,
    Tick(u64),
    Send(u8),
    Shutdown,
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        2 => Just(Event::Connect),
        3 => Just(Event::Open),
        3 => Just(Event::Close),
        3 => (0u64..30_000).prop_map(Event::Tick),
        3 => any::<u8>().prop_map(Event::Send),
        1 => Just(Event::Shutdown),
    ]
}

proptest! {
    #[test]
    fn prop_channel_invariants_hold(events in prop::collection::vec(event_strategy(), 0..60)) {
        let config = ChannelConfig::default();
        let mut channel: TransportChannel<Instant> = TransportChannel::new(config.clone());
        let t0 = Instant::now();
        let mut now = t0;
        let mut sent = 0usize;
        let mut flushed = 0usize;

        for event in events {
            let actions = match event {
                Event::Connect => channel.connect().unwrap_or_default(),
                Event::Open => channel.on_open(),
                Event::Close => channel.on_close(now, "fault injection"),
                Event::Tick(ms) => {
                    now += Duration::from_millis(ms);
                    channel.tick(now)
                },
                Event::Send(n) => {
                    sent += 1;
                    channel.send(format!("frame-{n}"))
                },
                Event::Shutdown => {
                    channel.shutdown();
                    sent = 0;
                    flushed = 0;
                    vec![]
                },
            };

            for action in &actions {
                match action {
                    ChannelAction::Transmit(_) => flushed += 1,
                    ChannelAction::RetryScheduled { delay, .. } => {
                        // Backoff is bounded by the configured window.
                        prop_assert!(*delay >= config.base_delay);
                        prop_assert!(*delay <= config.max_delay);
                        prop_assert_eq!(channel.state(), ChannelState::Disconnected);
                    },
                    ChannelAction::Resubscribe => {
                        prop_assert_eq!(channel.state(), ChannelState::Connected);
                    },
                    ChannelAction::Dial => {
                        prop_assert_eq!(channel.state(), ChannelState::Connecting);
                    },
                    ChannelAction::Unavailable => {
                        prop_assert!(channel.failure_count() >= config.max_attempts);
                    },
                }
            }

            // No frame is dropped or duplicated: everything sent is
            // either flushed or still buffered (until a shutdown).
            prop_assert_eq!(flushed + channel.pending_len(), sent);

            // Attempts never exceed the budget.
            prop_assert!(channel.failure_count() <= config.max_attempts);
        }
    }

    #[test]
    fn prop_retry_eventually_dials_or_reports_unavailable(failures in 1u32..10) {
        let config = ChannelConfig::default();
        let mut channel: TransportChannel<Instant> = TransportChannel::new(config.clone());
        let mut now = Instant::now();
        channel.connect().unwrap();

        for i in 1..=failures {
            let actions = channel.on_close(now, "down");

            if i >= config.max_attempts {
                prop_assert_eq!(actions, vec![ChannelAction::Unavailable]);
                // Wedged until an explicit connect, by contract.
                now += Duration::from_secs(120);
                prop_assert!(channel.tick(now).is_empty());
                return Ok(());
            }

            // Advancing past the max delay always reaches the next dial.
            now += config.max_delay;
            prop_assert_eq!(channel.tick(now), vec![ChannelAction::Dial]);
        }
    }
}
