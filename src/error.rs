//! Error types
//!
//! Every failure is scoped to one connection or one operation; none of these
//! is fatal to the server process.

use crate::auth::AdmissionDenied;
use crate::protocol::ValidationError;
use crate::registry::RegistryError;
use crate::server::channel::DeliveryError;

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registry operation failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Bad connect parameters or command
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Observer token rejected
    #[error(transparent)]
    Admission(#[from] AdmissionDenied),

    /// Write to a closed connection
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// WebSocket upgrade did not finish in time
    #[error("WebSocket handshake timed out")]
    HandshakeTimeout,

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
