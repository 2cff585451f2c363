//! In-session text commands
//!
//! Commands are plain UTF-8 text frames. Dispatch goes through an explicit
//! table of `(role, command text) → command` entries built at startup;
//! anything not in the table is rejected without closing the connection.

use std::collections::HashMap;

use super::error::ValidationError;
use crate::registry::Status;

/// Role a connection plays once classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Live service instance announcing itself
    Registrant,
    /// UI / monitor watching the registry
    Observer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Registrant => write!(f, "registrant"),
            Role::Observer => write!(f, "observer"),
        }
    }
}

/// Action a command maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Re-send the full listing to the requester only
    ListAll,
    /// Set the requester's own record status, then broadcast
    SetStatus(Status),
}

/// `ALL`
pub const CMD_ALL: &str = "ALL";
/// `UP`
pub const CMD_UP: &str = "UP";
/// `DOWN`
pub const CMD_DOWN: &str = "DOWN";
/// `OUT` (out of service)
pub const CMD_OUT: &str = "OUT";

/// `(role, text)` → command dispatch table
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: HashMap<Role, HashMap<&'static str, Command>>,
}

impl CommandTable {
    /// Empty table
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The canonical table: `ALL` for both roles, status commands for
    /// registrants only
    pub fn standard() -> Self {
        Self::empty()
            .with(Role::Registrant, CMD_ALL, Command::ListAll)
            .with(Role::Registrant, CMD_UP, Command::SetStatus(Status::Up))
            .with(Role::Registrant, CMD_DOWN, Command::SetStatus(Status::Down))
            .with(Role::Registrant, CMD_OUT, Command::SetStatus(Status::OutOfService))
            .with(Role::Observer, CMD_ALL, Command::ListAll)
    }

    /// Add an entry
    pub fn with(mut self, role: Role, text: &'static str, command: Command) -> Self {
        self.entries.entry(role).or_default().insert(text, command);
        self
    }

    /// Resolve command text sent by a connection of `role`
    pub fn resolve(&self, role: Role, text: &str) -> Result<Command, ValidationError> {
        let text = text.trim();

        if let Some(command) = self.entries.get(&role).and_then(|cmds| cmds.get(text)) {
            return Ok(*command);
        }

        let known_elsewhere = self.entries.values().any(|cmds| cmds.contains_key(text));
        if known_elsewhere {
            Err(ValidationError::CommandNotPermitted {
                command: text.to_string(),
                role,
            })
        } else {
            Err(ValidationError::InvalidCommand(text.to_string()))
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::standard()
    }
}
