//! Service registry implementation
//!
//! Store / remove / update / list semantics on top of the record store,
//! including the name-based refresh rule: a registrant that reconnects under
//! a new connection id takes over the single live record for its service
//! name instead of creating a duplicate.

use tokio::sync::Mutex;

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::record::{ServiceRecord, Status};
use super::store::RecordStore;

/// Central registry for all live service records
///
/// All mutations run under one mutation lock, so read-then-write operations
/// (the name scan in [`store`](Self::store), status read-modify-write) are
/// atomic with respect to concurrent callers. Reads go straight to the store.
#[derive(Debug)]
pub struct ServiceRegistry {
    /// Map of registration id to record
    records: RecordStore,

    /// Held for the duration of every mutation
    mutation: Mutex<()>,

    /// Configuration
    config: RegistryConfig,
}

impl ServiceRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            records: RecordStore::new(),
            mutation: Mutex::new(()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a record
    ///
    /// Fails if the registration id is already live. If a record with the
    /// same name exists, that record is migrated to the new registration id:
    /// the old id is evicted, the location is taken from `record`, the status
    /// is forced to `UP` and `last_updated` is refreshed.
    pub async fn store(&self, record: ServiceRecord) -> Result<ServiceRecord, RegistryError> {
        let _guard = self.mutation.lock().await;

        if self.records.contains(&record.registration_id).await {
            return Err(RegistryError::DuplicateRegistration(
                record.registration_id,
            ));
        }

        match self.records.find_by_name(&record.name).await {
            None => {
                tracing::info!(
                    name = %record.name,
                    id = %record.registration_id,
                    location = %record.location,
                    "Register new record"
                );

                self.records
                    .put(record.registration_id.clone(), record.clone())
                    .await;
                Ok(record)
            }
            Some(mut existing) => {
                tracing::info!(
                    name = %record.name,
                    id = %existing.registration_id,
                    new_id = %record.registration_id,
                    "Refresh record"
                );

                self.records.remove(&existing.registration_id).await;

                existing.registration_id = record.registration_id;
                existing.location = record.location;
                existing.set_status(Status::Up);

                self.records
                    .put(existing.registration_id.clone(), existing.clone())
                    .await;
                Ok(existing)
            }
        }
    }

    /// Remove a record by registration id
    ///
    /// Idempotent: returns `None` when nothing is stored under `id`. The
    /// returned record is marked `DOWN`.
    pub async fn remove(&self, id: &str) -> Option<ServiceRecord> {
        let _guard = self.mutation.lock().await;

        match self.records.remove(id).await {
            Some(mut record) => {
                record.set_status(Status::Down);
                tracing::info!(name = %record.name, id = %id, "Remove record");
                Some(record)
            }
            None => {
                tracing::debug!(id = %id, "Remove record: not present");
                None
            }
        }
    }

    /// Replace a live record by registration id
    ///
    /// Fails with `NotFound` if the id is not live, so removed records are
    /// never resurrected.
    pub async fn update(&self, mut record: ServiceRecord) -> Result<ServiceRecord, RegistryError> {
        let _guard = self.mutation.lock().await;

        if !self.records.contains(&record.registration_id).await {
            return Err(RegistryError::NotFound(record.registration_id));
        }

        record.touch();
        tracing::info!(
            name = %record.name,
            id = %record.registration_id,
            status = %record.status,
            "Update record"
        );

        self.records
            .put(record.registration_id.clone(), record.clone())
            .await;
        Ok(record)
    }

    /// Set the status of a live record
    pub async fn update_status(
        &self,
        id: &str,
        status: Status,
    ) -> Result<ServiceRecord, RegistryError> {
        let _guard = self.mutation.lock().await;

        let mut record = self
            .records
            .get(id)
            .await
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        record.set_status(status);
        tracing::info!(name = %record.name, id = %id, status = %status, "Update record status");

        self.records.put(id, record.clone()).await;
        Ok(record)
    }

    /// Snapshot of all live records, ordered by name then id
    pub async fn list(&self) -> Vec<ServiceRecord> {
        let mut records = self.records.list().await;
        records.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.registration_id.cmp(&b.registration_id))
        });

        tracing::debug!(count = records.len(), "Get all records");
        records
    }

    /// Get a record by registration id
    pub async fn get_by_id(&self, id: &str) -> Option<ServiceRecord> {
        self.records.get(id).await
    }

    /// Number of live records
    pub async fn len(&self) -> usize {
        self.records.len().await
    }

    /// Whether no records are live
    pub async fn is_empty(&self) -> bool {
        self.records.is_empty().await
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
