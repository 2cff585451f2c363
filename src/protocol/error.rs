//! Protocol validation errors

use super::command::Role;

/// Malformed connection parameters or in-session commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Required registration parameter missing or blank
    #[error("Invalid Connection! missing parameter `{0}`")]
    MissingParameter(&'static str),
    /// `port` is not a positive 16-bit integer
    #[error("Invalid Connection! bad port `{0}`")]
    InvalidPort(String),
    /// Unknown command text
    #[error("Invalid Command ({0})")]
    InvalidCommand(String),
    /// Known command that this role may not issue
    #[error("Command not permitted ({command}) for {role}")]
    CommandNotPermitted {
        command: String,
        role: Role,
    },
    /// Frame type the protocol does not use
    #[error("Unsupported frame")]
    UnsupportedFrame,
}
