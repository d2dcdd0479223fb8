//! In-memory registry implementation
//!
//! Suitable for tests, development, and daemons that seed their catalog
//! from configuration files. Production deployments front a real
//! discovery service behind the same trait.

use crate::error::Result;
use crate::registry::ServiceRegistry;
use async_trait::async_trait;
use bosun_settings::{ResolutionError, ServiceSettingsSource};
use bosun_types::{CapabilityBinding, ServiceId, ServiceShape};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;

/// In-memory service registry
#[derive(Default)]
pub struct MemoryServiceRegistry {
    shapes: DashMap<ServiceId, ServiceShape>,
}

impl MemoryServiceRegistry {
    pub fn new() -> Self {
        Self {
            shapes: DashMap::new(),
        }
    }

    /// Seed or replace a shape. This is the loader's surface, not part of
    /// the read-only `ServiceRegistry` contract.
    pub fn insert(&self, shape: ServiceShape) {
        self.shapes.insert(shape.id.clone(), shape);
    }
}

#[async_trait]
impl ServiceRegistry for MemoryServiceRegistry {
    async fn get_service_shape(&self, id: &ServiceId) -> Result<Option<ServiceShape>> {
        Ok(self.shapes.get(id).map(|s| s.clone()))
    }

    async fn list_services(&self) -> Result<Vec<ServiceId>> {
        Ok(self.shapes.iter().map(|s| s.key().clone()).collect())
    }
}

// The resolver's runtime-defaults and capability layers read through this
// seam; shapes already carry both inputs.
#[async_trait]
impl ServiceSettingsSource for MemoryServiceRegistry {
    async fn runtime_defaults(
        &self,
        service: &ServiceId,
    ) -> std::result::Result<BTreeMap<String, Value>, ResolutionError> {
        Ok(self
            .shapes
            .get(service)
            .map(|shape| shape.runtime_defaults.clone())
            .unwrap_or_default())
    }

    async fn capability_binding(
        &self,
        service: &ServiceId,
        name: &str,
    ) -> std::result::Result<Option<CapabilityBinding>, ResolutionError> {
        Ok(self.shapes.get(service).and_then(|shape| {
            shape
                .declared_vars
                .iter()
                .find(|var| var.name == name)
                .and_then(|var| var.capability.clone())
        }))
    }
}
