//! Registry server
//!
//! Accepts WebSocket connections, hands each to a session and fans registry
//! changes out to observers.

pub mod broadcast;
pub mod channel;
pub mod config;
pub mod connection;
pub mod hub;
pub mod listener;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use channel::{ChannelId, ConnectionHandle, DeliveryError, Outbound, OutboundQueue};
pub use config::ServerConfig;
pub use hub::Hub;
pub use listener::RegistryServer;
