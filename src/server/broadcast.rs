//! Change broadcast to observers
//!
//! Tracks the live observer connections (broadcast targets) and registrant
//! connections (broadcast triggers). After every registry mutation the full
//! listing is serialized once and queued to each observer. Delivery is
//! best-effort per target: a closed observer is logged, skipped and pruned,
//! and never fails the broadcast as a whole.
//!
//! Snapshot and enqueue happen under one fan-out lock, so listings reach
//! each observer's queue in the order they were read from the registry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::channel::{ChannelId, ConnectionHandle, DeliveryError};
use crate::error::Result;
use crate::protocol::Envelope;
use crate::registry::ServiceRegistry;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers the listing was queued to
    pub delivered: usize,
    /// Observers found closed and skipped
    pub skipped: usize,
}

/// Observer fan-out coordinator
#[derive(Debug)]
pub struct Broadcaster {
    registry: Arc<ServiceRegistry>,

    /// Held from listing snapshot until every queue has it
    fanout: Mutex<()>,

    /// Connections that receive every listing change
    observers: RwLock<HashMap<ChannelId, ConnectionHandle>>,

    /// Registrant connections whose changes trigger broadcasts
    triggers: RwLock<HashSet<ChannelId>>,
}

impl Broadcaster {
    /// Create a broadcaster reading listings from `registry`
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            fanout: Mutex::new(()),
            observers: RwLock::new(HashMap::new()),
            triggers: RwLock::new(HashSet::new()),
        }
    }

    /// Add an observer connection
    pub async fn add_observer(&self, handle: ConnectionHandle) {
        let mut observers = self.observers.write().await;
        observers.insert(handle.id().clone(), handle);
        tracing::debug!(observers = observers.len(), "Observer added");
    }

    /// Remove an observer connection
    pub async fn remove_observer(&self, id: &ChannelId) -> bool {
        let mut observers = self.observers.write().await;
        let removed = observers.remove(id).is_some();
        tracing::debug!(channel = %id, observers = observers.len(), "Observer removed");
        removed
    }

    /// Add a registrant connection to the trigger set
    pub async fn add_trigger(&self, id: ChannelId) {
        self.triggers.write().await.insert(id);
    }

    /// Remove a registrant connection from the trigger set
    pub async fn remove_trigger(&self, id: &ChannelId) -> bool {
        self.triggers.write().await.remove(id)
    }

    /// Number of observers
    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Number of registrant triggers
    pub async fn trigger_count(&self) -> usize {
        self.triggers.read().await.len()
    }

    /// Whether `id` is a registered observer
    pub async fn is_observer(&self, id: &ChannelId) -> bool {
        self.observers.read().await.contains_key(id)
    }

    /// Whether `id` is a registered trigger
    pub async fn is_trigger(&self, id: &ChannelId) -> bool {
        self.triggers.read().await.contains(id)
    }

    /// Serialize the current listing
    async fn listing(&self) -> Result<Arc<str>> {
        let records = self.registry.list().await;
        let json = Envelope::listing(&records).to_json()?;
        Ok(Arc::from(json))
    }

    /// Send the current listing to one connection
    pub async fn send_listing(&self, handle: &ConnectionHandle) -> Result<()> {
        let _fanout = self.fanout.lock().await;
        let listing = self.listing().await?;

        match handle.send_text(listing) {
            Ok(()) => {
                tracing::debug!(channel = %handle.id(), "Send result");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(channel = %handle.id(), "Connection already closed, listing not sent");
                Err(e.into())
            }
        }
    }

    /// Push the current listing to every observer
    pub async fn broadcast_all(&self) -> Result<BroadcastReport> {
        let _fanout = self.fanout.lock().await;
        let listing = self.listing().await?;
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        {
            let observers = self.observers.read().await;
            for (id, handle) in observers.iter() {
                match handle.send_text(Arc::clone(&listing)) {
                    Ok(()) => report.delivered += 1,
                    Err(DeliveryError::Closed(_)) => {
                        tracing::warn!(channel = %id, "Skipping closed observer");
                        report.skipped += 1;
                        closed.push(id.clone());
                    }
                }
            }
        }

        if !closed.is_empty() {
            let mut observers = self.observers.write().await;
            for id in &closed {
                observers.remove(id);
            }
        }

        tracing::debug!(
            delivered = report.delivered,
            skipped = report.skipped,
            "Broadcast listing"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceRecord;
    use crate::server::channel::Outbound;

    async fn registry_with_one() -> Arc<ServiceRegistry> {
        let registry = Arc::new(ServiceRegistry::new());
        registry
            .store(ServiceRecord::http_endpoint("conn-1", "svc-a", "10.0.0.1", 8080))
            .await
            .unwrap();
        registry
    }

    fn listing_json(outbound: Option<Outbound>) -> serde_json::Value {
        match outbound {
            Some(Outbound::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_observers() {
        let broadcaster = Broadcaster::new(registry_with_one().await);
        let (a, mut qa) = ConnectionHandle::new(ChannelId::from("ui-a"));
        let (b, mut qb) = ConnectionHandle::new(ChannelId::from("ui-b"));
        broadcaster.add_observer(a).await;
        broadcaster.add_observer(b).await;

        let report = broadcaster.broadcast_all().await.unwrap();
        assert_eq!(report, BroadcastReport { delivered: 2, skipped: 0 });

        for queue in [&mut qa, &mut qb] {
            let json = listing_json(queue.recv().await);
            assert_eq!(json["status"], 200);
            assert_eq!(json["data"][0]["name"], "svc-a");
        }
    }

    #[tokio::test]
    async fn test_closed_observer_skipped_and_pruned() {
        let broadcaster = Broadcaster::new(registry_with_one().await);
        let (alive, mut alive_q) = ConnectionHandle::new(ChannelId::from("ui-alive"));
        let (dead, dead_q) = ConnectionHandle::new(ChannelId::from("ui-dead"));
        drop(dead_q);
        broadcaster.add_observer(alive).await;
        broadcaster.add_observer(dead).await;

        let report = broadcaster.broadcast_all().await.unwrap();
        assert_eq!(report, BroadcastReport { delivered: 1, skipped: 1 });
        assert_eq!(broadcaster.observer_count().await, 1);
        assert!(alive_q.recv().await.is_some());

        let report = broadcaster.broadcast_all().await.unwrap();
        assert_eq!(report, BroadcastReport { delivered: 1, skipped: 0 });
    }

    #[tokio::test]
    async fn test_broadcast_with_no_observers() {
        let broadcaster = Broadcaster::new(registry_with_one().await);
        let report = broadcaster.broadcast_all().await.unwrap();
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_triggers_not_broadcast_targets() {
        let broadcaster = Broadcaster::new(registry_with_one().await);
        broadcaster.add_trigger(ChannelId::from("conn-1")).await;

        assert_eq!(broadcaster.trigger_count().await, 1);
        assert_eq!(broadcaster.broadcast_all().await.unwrap().delivered, 0);

        assert!(broadcaster.remove_trigger(&ChannelId::from("conn-1")).await);
        assert!(!broadcaster.remove_trigger(&ChannelId::from("conn-1")).await);
    }

    #[tokio::test]
    async fn test_send_listing_to_one() {
        let broadcaster = Broadcaster::new(registry_with_one().await);
        let (handle, mut queue) = ConnectionHandle::new(ChannelId::from("ui"));

        broadcaster.send_listing(&handle).await.unwrap();
        let json = listing_json(queue.recv().await);
        assert_eq!(json["data"].as_array().unwrap().len(), 1);

        drop(queue);
        assert!(broadcaster.send_listing(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_observer() {
        let broadcaster = Broadcaster::new(registry_with_one().await);
        let (handle, _queue) = ConnectionHandle::new(ChannelId::from("ui"));
        broadcaster.add_observer(handle).await;

        assert!(broadcaster.is_observer(&ChannelId::from("ui")).await);
        assert!(broadcaster.remove_observer(&ChannelId::from("ui")).await);
        assert_eq!(broadcaster.observer_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_last_listing_matches_registry_under_contention() {
        use crate::registry::Status;

        let registry = registry_with_one().await;
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));
        let (handle, mut queue) = ConnectionHandle::new(ChannelId::from("ui"));
        broadcaster.add_observer(handle).await;

        for _ in 0..200 {
            let tasks: Vec<_> = (0..8)
                .map(|i| {
                    let registry = Arc::clone(&registry);
                    let broadcaster = Arc::clone(&broadcaster);
                    let status = if i % 2 == 0 {
                        Status::Down
                    } else {
                        Status::OutOfService
                    };
                    tokio::spawn(async move {
                        registry.update_status("conn-1", status).await.unwrap();
                        broadcaster.broadcast_all().await.unwrap();
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            let mut last = None;
            while let Some(outbound) = queue.try_recv() {
                last = Some(outbound);
            }
            let json = listing_json(last);
            let current = registry.get_by_id("conn-1").await.unwrap();
            assert_eq!(json["data"][0]["status"], current.status.to_string());
        }
    }
}
