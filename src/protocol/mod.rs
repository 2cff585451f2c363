//! Registry wire protocol
//!
//! This module provides:
//! - Connect parameter parsing and role classification
//! - The in-session command table
//! - The outbound JSON envelope

pub mod command;
pub mod envelope;
pub mod error;
pub mod query;

pub use command::{Command, CommandTable, Role};
pub use envelope::{Envelope, Payload, ResponseStatus};
pub use error::ValidationError;
pub use query::{ConnectIntent, ConnectParams, RegistrantParams};

/// WebSocket close code for policy violations (RFC 6455 §7.4.1)
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
