//! Core state machines for the Tidelink sync engine.
//!
//! Everything here is sans-IO: state machines take the current time as an
//! input and return actions for a driver to execute. The [`env`] module
//! decouples protocol logic from system resources so the same code runs in
//! production and in deterministic tests.

pub mod channel;
pub mod env;
pub mod error;

pub use channel::{ChannelAction, ChannelConfig, ChannelState, TransportChannel};
pub use error::ChannelError;
