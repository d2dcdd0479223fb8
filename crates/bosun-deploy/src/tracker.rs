//! Deployment tracker
//!
//! Persists deployment records keyed by deployment id, independent of
//! which backend created them. `backend_metadata` passes through opaque.
//! The tracker also serializes mutating operations: at most one in-flight
//! operation per deployment id, enforced by a guarded state transition
//! check — an operation from an incompatible state fails immediately
//! rather than queuing. Operations on different ids proceed in parallel.

use crate::error::{DeployError, Result};
use async_trait::async_trait;
use bosun_types::{
    DeploymentId, DeploymentOperation, DeploymentRecord, InvalidTransition, ServiceId,
};
use dashmap::DashMap;
use std::sync::Arc;

/// Keyed document collection for deployment records
#[async_trait]
pub trait TrackerStore: Send + Sync {
    async fn get(&self, id: &DeploymentId) -> Result<Option<DeploymentRecord>>;

    async fn upsert(&self, record: DeploymentRecord) -> Result<()>;

    async fn list_by_service(&self, service_id: &ServiceId) -> Result<Vec<DeploymentRecord>>;
}

/// In-memory tracker store
#[derive(Default)]
pub struct MemoryTrackerStore {
    records: DashMap<DeploymentId, DeploymentRecord>,
}

impl MemoryTrackerStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

#[async_trait]
impl TrackerStore for MemoryTrackerStore {
    async fn get(&self, id: &DeploymentId) -> Result<Option<DeploymentRecord>> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn upsert(&self, record: DeploymentRecord) -> Result<()> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn list_by_service(&self, service_id: &ServiceId) -> Result<Vec<DeploymentRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| &r.service_id == service_id)
            .map(|r| r.value().clone())
            .collect())
    }
}

/// Releases the in-flight slot when the operation finishes
#[derive(Debug)]
pub struct OperationGuard {
    in_flight: Arc<DashMap<DeploymentId, DeploymentOperation>>,
    id: DeploymentId,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

/// Deployment tracker: record storage plus per-id operation serialization
pub struct DeploymentTracker {
    store: Arc<dyn TrackerStore>,
    in_flight: Arc<DashMap<DeploymentId, DeploymentOperation>>,
}

impl DeploymentTracker {
    pub fn new(store: Arc<dyn TrackerStore>) -> Self {
        Self {
            store,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub async fn record(&self, id: &DeploymentId) -> Result<DeploymentRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| DeployError::DeploymentNotFound(id.clone()))
    }

    pub async fn upsert(&self, record: DeploymentRecord) -> Result<()> {
        self.store.upsert(record).await
    }

    pub async fn list_by_service(&self, service_id: &ServiceId) -> Result<Vec<DeploymentRecord>> {
        self.store.list_by_service(service_id).await
    }

    /// Claim the id for `operation`.
    ///
    /// Fails immediately when another operation is in flight for the id,
    /// or when the record's current state does not permit the operation.
    /// The returned guard releases the claim on drop.
    pub async fn begin(
        &self,
        id: &DeploymentId,
        operation: DeploymentOperation,
    ) -> Result<(DeploymentRecord, OperationGuard)> {
        let claimed = match self.in_flight.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                return Err(DeployError::OperationInFlight {
                    id: id.clone(),
                    operation: *existing.get(),
                });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(operation);
                OperationGuard {
                    in_flight: self.in_flight.clone(),
                    id: id.clone(),
                }
            }
        };

        // State check happens under the claim so a concurrent operation
        // cannot transition the record between check and use.
        let record = match self.record(id).await {
            Ok(record) => record,
            Err(err) => return Err(err),
        };
        if !record.status.permits(operation) {
            return Err(InvalidTransition::new(&record.status, operation).into());
        }

        Ok((record, claimed))
    }
}
