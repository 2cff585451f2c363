//! Record store
//!
//! Concurrent map from registration id to service record. The store has no
//! eviction policy of its own; records leave only when a caller removes them.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::record::ServiceRecord;

/// Concurrent registration-id → record map
///
/// Thread-safe via `RwLock`. Listing and lookups share read access; every
/// call is atomic at map level.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: RwLock<HashMap<String, ServiceRecord>>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record by id
    pub async fn get(&self, id: &str) -> Option<ServiceRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Insert or replace a record under `id`
    ///
    /// Returns the previous record stored under that id, if any.
    pub async fn put(&self, id: impl Into<String>, record: ServiceRecord) -> Option<ServiceRecord> {
        self.records.write().await.insert(id.into(), record)
    }

    /// Remove a record by id
    pub async fn remove(&self, id: &str) -> Option<ServiceRecord> {
        self.records.write().await.remove(id)
    }

    /// Check whether a record is stored under `id`
    pub async fn contains(&self, id: &str) -> bool {
        self.records.read().await.contains_key(id)
    }

    /// Snapshot of all records (order not significant)
    pub async fn list(&self) -> Vec<ServiceRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Find the first record with the given service name
    pub async fn find_by_name(&self, name: &str) -> Option<ServiceRecord> {
        self.records
            .read()
            .await
            .values()
            .find(|record| record.name == name)
            .cloned()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
