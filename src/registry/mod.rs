//! Service registry
//!
//! The registry holds one record per live service and applies the
//! registration, refresh, status and removal rules. It knows nothing about
//! connections; sessions call into it and the broadcaster reads from it.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<ServiceRegistry>
//!                 ┌─────────────────────────────┐
//!                 │ mutation: Mutex<()>         │
//!                 │ records: RecordStore {      │
//!                 │   id -> ServiceRecord       │
//!                 │ }                           │
//!                 └──────────────┬──────────────┘
//!                                │
//!         ┌──────────────────────┼──────────────────────┐
//!         │                      │                      │
//!         ▼                      ▼                      ▼
//!   [Registrant]           [Registrant]            [Broadcaster]
//!   store()/update()       remove() after          list() ──► observers
//!                          grace period
//! ```

pub mod config;
pub mod error;
pub mod record;
pub mod service;
pub mod store;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use record::{Location, ServiceRecord, Status};
pub use service::ServiceRegistry;
pub use store::RecordStore;
