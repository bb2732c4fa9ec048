//! Error types for the Tidelink core.
//!
//! Only explicit caller mistakes surface as errors. Transport-level
//! failures (lost connections, dial timeouts) are not errors here; they
//! feed the channel state machine, which retries per its backoff policy.

use thiserror::Error;

use crate::channel::ChannelState;

/// Errors from transport channel operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// An operation was called in a state that does not permit it.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred.
        state: ChannelState,
        /// Operation that was attempted.
        operation: String,
    },
}
