//! Protocol error types.
//!
//! Envelope and payload decode failures never propagate into application
//! code as panics; callers log and drop the offending frame.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from envelope and payload decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The raw frame text is not a valid envelope.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope {
        /// Parse failure description.
        reason: String,
    },

    /// A data frame arrived without a channel name.
    #[error("data frame missing channel name")]
    MissingChannel,

    /// A data frame arrived without an event body.
    #[error("data frame missing event body")]
    MissingEvent,

    /// The inner event string is not valid JSON for the expected payload.
    #[error("malformed payload on channel {channel}: {reason}")]
    MalformedPayload {
        /// Channel the frame arrived on.
        channel: String,
        /// Parse failure description.
        reason: String,
    },
}
