//! Shared server components
//!
//! One `Hub` is created per server and cloned into every connection task and
//! every eviction timer. It owns the registry, the broadcaster, the
//! admission gate and the command table.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::broadcast::Broadcaster;
use super::channel::ChannelId;
use crate::auth::AdmissionGate;
use crate::protocol::CommandTable;
use crate::registry::{RegistryConfig, ServiceRegistry};

/// Handle to the components shared by all sessions
#[derive(Debug, Clone)]
pub struct Hub {
    registry: Arc<ServiceRegistry>,
    broadcaster: Arc<Broadcaster>,
    gate: Arc<AdmissionGate>,
    commands: Arc<CommandTable>,
}

impl Hub {
    /// Create a hub with a fresh registry and gate
    pub fn new(registry_config: RegistryConfig, token_length: usize) -> Self {
        Self::with_parts(
            Arc::new(ServiceRegistry::with_config(registry_config)),
            Arc::new(AdmissionGate::with_token_length(token_length)),
            CommandTable::standard(),
        )
    }

    /// Assemble a hub from existing components
    pub fn with_parts(
        registry: Arc<ServiceRegistry>,
        gate: Arc<AdmissionGate>,
        commands: CommandTable,
    ) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));

        Self {
            registry,
            broadcaster,
            gate,
            commands: Arc::new(commands),
        }
    }

    /// The service registry
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// The observer broadcaster
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// The observer admission gate
    pub fn gate(&self) -> &Arc<AdmissionGate> {
        &self.gate
    }

    /// The command dispatch table
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Broadcast the listing, logging instead of failing
    pub async fn broadcast(&self) {
        if let Err(e) = self.broadcaster.broadcast_all().await {
            tracing::error!(error = %e, "Failed to broadcast records");
        }
    }

    /// Remove `id`'s record once the grace period has elapsed
    ///
    /// If the service re-registered under a new id in the meantime, its
    /// record no longer lives under `id` and the removal is a no-op.
    pub fn schedule_removal(&self, id: ChannelId) -> JoinHandle<()> {
        let hub = self.clone();
        let delay = self.registry.config().eviction_grace_period;

        tracing::debug!(id = %id, delay = ?delay, "Schedule record removal");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match hub.registry.remove(id.as_str()).await {
                Some(record) => {
                    tracing::info!(
                        name = %record.name,
                        id = %id,
                        "Succeed to remove inactive record"
                    );
                    hub.broadcast().await;
                }
                None => {
                    tracing::debug!(id = %id, "Inactive record already gone");
                }
            }
        })
    }
}
