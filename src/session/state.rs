//! Session state machine
//!
//! Tracks one connection from upgrade to teardown:
//! `Connecting → Registered | Observing → Closing → Closed`.

use std::time::{Duration, Instant};

use crate::protocol::Role;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Upgraded, not yet classified
    Connecting,
    /// Registrant whose record is stored
    Registered,
    /// Admitted observer
    Observing,
    /// Teardown in progress
    Closing,
    /// Terminal
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Current phase
    pub phase: SessionPhase,

    /// Role, once classified
    pub role: Option<Role>,

    /// Connection start time
    pub connected_at: Instant,

    /// When the session became `Registered` or `Observing`
    pub admitted_at: Option<Instant>,

    /// Text commands received
    pub commands_received: u64,

    /// Text commands rejected
    pub commands_rejected: u64,
}

impl SessionState {
    /// Create a new session state
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Connecting,
            role: None,
            connected_at: Instant::now(),
            admitted_at: None,
            commands_received: 0,
            commands_rejected: 0,
        }
    }

    /// Registration stored
    pub fn on_registered(&mut self) -> bool {
        self.admit(SessionPhase::Registered, Role::Registrant)
    }

    /// Observer admitted
    pub fn on_observing(&mut self) -> bool {
        self.admit(SessionPhase::Observing, Role::Observer)
    }

    fn admit(&mut self, phase: SessionPhase, role: Role) -> bool {
        if self.phase != SessionPhase::Connecting {
            return false;
        }
        self.phase = phase;
        self.role = Some(role);
        self.admitted_at = Some(Instant::now());
        true
    }

    /// Start closing the session
    ///
    /// Returns the phase the session was in, so teardown knows what to undo.
    pub fn close(&mut self) -> SessionPhase {
        let previous = self.phase;
        if !matches!(previous, SessionPhase::Closing | SessionPhase::Closed) {
            self.phase = SessionPhase::Closing;
        }
        previous
    }

    /// Teardown complete
    pub fn finish(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Whether the session accepts commands
    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Registered | SessionPhase::Observing)
    }

    /// Whether the session has reached its terminal state
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// Get session duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registrant_lifecycle() {
        let mut state = SessionState::new();
        assert_eq!(state.phase, SessionPhase::Connecting);
        assert!(!state.is_active());

        assert!(state.on_registered());
        assert_eq!(state.phase, SessionPhase::Registered);
        assert_eq!(state.role, Some(Role::Registrant));
        assert!(state.admitted_at.is_some());
        assert!(state.is_active());

        assert_eq!(state.close(), SessionPhase::Registered);
        assert_eq!(state.phase, SessionPhase::Closing);
        assert!(!state.is_active());

        state.finish();
        assert!(state.is_closed());
    }

    #[test]
    fn test_observer_lifecycle() {
        let mut state = SessionState::new();

        assert!(state.on_observing());
        assert_eq!(state.role, Some(Role::Observer));
        assert_eq!(state.close(), SessionPhase::Observing);
    }

    #[test]
    fn test_admit_only_from_connecting() {
        let mut state = SessionState::new();
        assert!(state.on_observing());
        assert!(!state.on_registered());
        assert_eq!(state.role, Some(Role::Observer));

        let mut state = SessionState::new();
        state.close();
        assert!(!state.on_registered());
        assert_eq!(state.phase, SessionPhase::Closing);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut state = SessionState::new();
        state.on_registered();

        assert_eq!(state.close(), SessionPhase::Registered);
        assert_eq!(state.close(), SessionPhase::Closing);
        state.finish();
        assert_eq!(state.close(), SessionPhase::Closed);
        assert!(state.is_closed());
    }
}
