//! Environment abstraction for deterministic testing.
//!
//! Decouples sync logic from system resources (time). Enables
//! deterministic tests with a virtual clock, and production use with real
//! system time.

use std::time::Duration;

/// Abstract environment providing time and async primitives.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - Methods are infallible except in exceptional circumstances (e.g.,
///   incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments may use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - This method MUST return values that never decrease within a single
    ///   execution context. Subsequent calls must return times >= previous
    ///   calls.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Used only for stamping optimistic entries; ordering logic relies on
    /// server-assigned timestamps once entries are confirmed.
    fn unix_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be
    /// used by driver code (not protocol logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}

/// Production environment backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a production environment.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn unix_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Deterministic environment for tests.
pub mod test_utils {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    };

    use super::Environment;

    /// Arbitrary wall-clock origin so stamped times are stable across runs.
    const MOCK_EPOCH_MS: u64 = 1_700_000_000_000;

    /// Deterministic environment with a manually advanced clock.
    ///
    /// `now()` is a fixed base `Instant` plus the accumulated virtual
    /// offset; `advance()` moves the clock forward without real waiting.
    #[derive(Clone)]
    pub struct MockEnv {
        base: Instant,
        offset_ns: Arc<AtomicU64>,
    }

    impl MockEnv {
        /// Create a mock environment with the clock at zero offset.
        pub fn new() -> Self {
            Self { base: Instant::now(), offset_ns: Arc::new(AtomicU64::new(0)) }
        }

        /// Advance the virtual clock.
        pub fn advance(&self, duration: Duration) {
            self.offset_ns.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
        }
    }

    impl Default for MockEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Environment for MockEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.base + Duration::from_nanos(self.offset_ns.load(Ordering::SeqCst))
        }

        fn unix_millis(&self) -> u64 {
            MOCK_EPOCH_MS + self.offset_ns.load(Ordering::SeqCst) / 1_000_000
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::{Environment, test_utils::MockEnv};

    #[test]
    fn mock_clock_advances_only_when_told() {
        let env = MockEnv::new();
        let t0 = env.now();
        assert_eq!(env.now(), t0);

        env.advance(Duration::from_secs(3));
        assert_eq!(env.now() - t0, Duration::from_secs(3));
    }

    #[test]
    fn mock_wall_clock_tracks_virtual_time() {
        let env = MockEnv::new();
        let t0 = env.unix_millis();
        env.advance(Duration::from_millis(250));
        assert_eq!(env.unix_millis() - t0, 250);
    }
}
