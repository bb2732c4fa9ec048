//! Client error types.

use thiserror::Error;
use tidelink_core::ChannelError;
use tidelink_proto::ProtocolError;

/// Errors raised inside a channel handler.
///
/// Handler errors are caught and logged at the dispatch boundary; they
/// never corrupt registry state or prevent delivery on other channels.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The event payload did not decode into the expected type.
    #[error(transparent)]
    Decode(#[from] ProtocolError),

    /// Handler-specific failure.
    #[error("handler failed: {0}")]
    Other(String),
}

/// Errors from session operations.
///
/// Only explicit caller mistakes surface here. Transport failures are
/// retried internally; confirmation failures surface as
/// [`SessionNotice`](crate::SessionNotice) values, not errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The underlying transport channel rejected a transition.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
