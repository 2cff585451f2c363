//! Live service registry
//!
//! Services connect over a WebSocket to announce themselves; observers (UIs,
//! monitors) connect over the same endpoint to watch the registry change in
//! real time.
//!
//! # Roles
//!
//! - **Registrant**: `ws://host/?name=svc-a&host=10.0.0.1&port=8080`. The
//!   connection id becomes the record's registration id. A service that
//!   reconnects under the same name takes over its previous record.
//! - **Observer**: `ws://host/?isUI=true&token=<token>`. Tokens come from the
//!   [`AdmissionGate`](auth::AdmissionGate) and admit exactly one connection.
//!
//! # Commands
//!
//! Text frames `ALL`, `UP`, `DOWN` and `OUT` (out of service). Status
//! commands are accepted from registrants only.
//!
//! # Disconnects
//!
//! A registrant that disconnects is marked `DOWN` immediately and removed
//! after the eviction grace period (10 seconds by default) unless it
//! reconnects first.
//!
//! # Example
//!
//! ```no_run
//! use live_registry::{RegistryServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> live_registry::Result<()> {
//!     let server = RegistryServer::new(ServerConfig::default());
//!     println!("observer token: {}", server.hub().gate().current());
//!     server.run().await
//! }
//! ```

pub mod auth;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use auth::{AdmissionDenied, AdmissionGate};
pub use error::{Error, Result};
pub use registry::{Location, RegistryConfig, RegistryError, ServiceRecord, ServiceRegistry, Status};
pub use server::{Hub, RegistryServer, ServerConfig};
