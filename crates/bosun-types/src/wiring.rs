//! Capability wiring edges
//!
//! Wiring binds a capability-consuming service instance to the instance
//! that provides the capability. Each (consumer, capability) slot holds at
//! most one active edge; the graph enforces that at write time.

use crate::ids::InstanceConfigId;
use serde::{Deserialize, Serialize};

/// One directed edge in the capability wiring graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringEdge {
    /// Instance consuming the capability
    pub consumer_instance_id: InstanceConfigId,

    /// Capability slot on the consumer, e.g. `llm`
    pub consumer_capability: String,

    /// Instance providing the capability
    pub provider_instance_id: InstanceConfigId,

    /// Capability name as exposed by the provider
    pub provider_capability: String,
}

impl WiringEdge {
    pub fn new(
        consumer: InstanceConfigId,
        consumer_capability: impl Into<String>,
        provider: InstanceConfigId,
        provider_capability: impl Into<String>,
    ) -> Self {
        Self {
            consumer_instance_id: consumer,
            consumer_capability: consumer_capability.into(),
            provider_instance_id: provider,
            provider_capability: provider_capability.into(),
        }
    }

    /// The slot this edge occupies
    pub fn slot(&self) -> (&InstanceConfigId, &str) {
        (&self.consumer_instance_id, &self.consumer_capability)
    }
}
