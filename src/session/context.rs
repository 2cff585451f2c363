//! Session context
//!
//! Read-only facts about a connection, captured at upgrade time.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::protocol::ConnectParams;
use crate::server::channel::ChannelId;

/// Connection facts shared with logging and handlers
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Connection id (registration id for registrants)
    pub channel_id: ChannelId,

    /// Remote peer address, if known
    pub peer_addr: Option<SocketAddr>,

    /// Parameters from the upgrade request
    pub params: Arc<ConnectParams>,
}

impl SessionContext {
    /// Create a new context
    pub fn new(channel_id: ChannelId, peer_addr: Option<SocketAddr>, params: ConnectParams) -> Self {
        Self {
            channel_id,
            peer_addr,
            params: Arc::new(params),
        }
    }

    /// Peer address for logging
    pub fn peer(&self) -> String {
        self.peer_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}
