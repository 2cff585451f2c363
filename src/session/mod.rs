//! Connection sessions
//!
//! A session classifies its connection as registrant or observer, runs
//! in-session commands and undoes its registrations on disconnect.

pub mod context;
pub mod handler;
pub mod state;

pub use context::SessionContext;
pub use handler::Session;
pub use state::{SessionPhase, SessionState};
