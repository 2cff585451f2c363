//! Per-connection outbound channel
//!
//! Sessions and the broadcaster never write to a socket directly. They push
//! [`Outbound`] messages onto an unbounded queue owned by the connection's
//! writer task, so a slow peer can never stall the caller. Once the writer
//! fails, times out or sends a close frame, the handle reports closed and
//! further sends are skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::protocol::{Envelope, ResponseStatus};

/// Opaque per-connection identifier
///
/// Doubles as the registration id of a registrant's record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(String);

impl ChannelId {
    /// Fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow as `&str`
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message queued for a connection's writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// UTF-8 text frame (shared so one serialized listing serves every observer)
    Text(Arc<str>),
    /// Close frame; the writer stops after sending it
    Close { code: u16, reason: String },
}

/// Write to a connection that is already closed or broken
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Connection [{0}] already closed")]
    Closed(ChannelId),
}

/// Cloneable sending side of a connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ChannelId,
    tx: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

/// Receiving side, owned by the connection's writer task
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::UnboundedReceiver<Outbound>,
    closed: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Create a handle and the queue its writer drains
    pub fn new(id: ChannelId) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let handle = Self {
            id,
            tx,
            closed: Arc::clone(&closed),
        };
        (handle, OutboundQueue { rx, closed })
    }

    /// Connection id
    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    /// Whether sends will be skipped
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// Queue a text frame
    pub fn send_text(&self, text: impl Into<Arc<str>>) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed(self.id.clone()));
        }

        self.tx
            .send(Outbound::Text(text.into()))
            .map_err(|_| DeliveryError::Closed(self.id.clone()))
    }

    /// Queue a message envelope
    ///
    /// Mirrors the registry's response convention: closed connections are
    /// logged and skipped.
    pub fn respond(&self, status: ResponseStatus, message: &str) -> Result<(), DeliveryError> {
        let text = match Envelope::message(status, message).to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(channel = %self.id, error = %e, "Failed to encode response");
                return Ok(());
            }
        };

        match self.send_text(text) {
            Ok(()) => {
                tracing::debug!(channel = %self.id, status = status.code(), "Response queued");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    channel = %self.id,
                    "Connection already closed! would not send back response"
                );
                Err(e)
            }
        }
    }

    /// Queue a close frame after anything already queued
    ///
    /// The handle reports closed immediately afterwards.
    ///
    /// Reasons longer than [`MAX_CLOSE_REASON`] bytes are cut at a char
    /// boundary.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), DeliveryError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(DeliveryError::Closed(self.id.clone()));
        }

        let mut reason = reason.into();
        truncate_reason(&mut reason);

        self.tx
            .send(Outbound::Close { code, reason })
            .map_err(|_| DeliveryError::Closed(self.id.clone()))
    }
}

/// Longest close reason that fits a control frame (125 bytes minus the code)
pub const MAX_CLOSE_REASON: usize = 123;

fn truncate_reason(reason: &mut String) {
    if reason.len() <= MAX_CLOSE_REASON {
        return;
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason.truncate(end);
}

impl OutboundQueue {
    /// Next queued message, `None` once every handle is dropped
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    /// Next queued message without waiting
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }

    /// Mark the connection closed so handles stop queueing
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether the connection has been marked closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
