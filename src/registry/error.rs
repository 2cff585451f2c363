//! Registry error types
//!
//! Error types for service registry operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A record with this registration id is already live
    #[error("The record has already been registered: {0}")]
    DuplicateRegistration(String),
    /// No live record with this registration id
    #[error("Record not found: {0}")]
    NotFound(String),
}
