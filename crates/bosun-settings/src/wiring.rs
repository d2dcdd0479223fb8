//! Capability wiring graph
//!
//! An explicit edge set keyed by (consumer instance, capability slot).
//! Keeping the edges out of instance records makes the one-edge-per-slot
//! invariant enforceable in one place. The resolver consults the graph
//! read-only; only explicit wiring operations mutate it.

use crate::error::WiringError;
use bosun_types::{InstanceConfigId, WiringEdge};
use dashmap::DashMap;

/// Directed mapping from capability consumers to providers
#[derive(Default)]
pub struct WiringGraph {
    edges: DashMap<(InstanceConfigId, String), WiringEdge>,
}

impl WiringGraph {
    pub fn new() -> Self {
        Self {
            edges: DashMap::new(),
        }
    }

    /// The provider wired into a consumer's capability slot, if any
    pub fn provider_for(
        &self,
        consumer: &InstanceConfigId,
        capability: &str,
    ) -> Option<InstanceConfigId> {
        self.edges
            .get(&(consumer.clone(), capability.to_string()))
            .map(|edge| edge.provider_instance_id.clone())
    }

    /// Install an edge. Re-setting an identical edge is idempotent; a
    /// different provider for an occupied slot is rejected — clear the
    /// slot first.
    pub fn set_wiring(&self, edge: WiringEdge) -> Result<(), WiringError> {
        let key = (
            edge.consumer_instance_id.clone(),
            edge.consumer_capability.clone(),
        );
        match self.edges.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                if existing.get() == &edge {
                    Ok(())
                } else {
                    Err(WiringError::SlotOccupied {
                        consumer: edge.consumer_instance_id,
                        capability: edge.consumer_capability,
                        existing_provider: existing.get().provider_instance_id.clone(),
                    })
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(edge);
                Ok(())
            }
        }
    }

    /// Remove a slot's edge; returns whether one existed
    pub fn clear_wiring(&self, consumer: &InstanceConfigId, capability: &str) -> bool {
        self.edges
            .remove(&(consumer.clone(), capability.to_string()))
            .is_some()
    }

    /// All active edges, for inspection surfaces
    pub fn list(&self) -> Vec<WiringEdge> {
        self.edges.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(consumer: &str, capability: &str, provider: &str) -> WiringEdge {
        WiringEdge::new(
            InstanceConfigId::new(consumer),
            capability,
            InstanceConfigId::new(provider),
            capability,
        )
    }

    #[test]
    fn test_set_and_lookup() {
        let graph = WiringGraph::new();
        graph.set_wiring(edge("c", "llm", "p")).unwrap();

        assert_eq!(
            graph.provider_for(&InstanceConfigId::new("c"), "llm"),
            Some(InstanceConfigId::new("p"))
        );
        assert_eq!(graph.provider_for(&InstanceConfigId::new("c"), "db"), None);
    }

    #[test]
    fn test_one_edge_per_slot() {
        let graph = WiringGraph::new();
        graph.set_wiring(edge("c", "llm", "p1")).unwrap();

        let err = graph.set_wiring(edge("c", "llm", "p2")).unwrap_err();
        assert!(matches!(err, WiringError::SlotOccupied { .. }));

        // The original edge survives the rejected write.
        assert_eq!(
            graph.provider_for(&InstanceConfigId::new("c"), "llm"),
            Some(InstanceConfigId::new("p1"))
        );
    }

    #[test]
    fn test_identical_rewire_is_idempotent() {
        let graph = WiringGraph::new();
        graph.set_wiring(edge("c", "llm", "p")).unwrap();
        graph.set_wiring(edge("c", "llm", "p")).unwrap();
        assert_eq!(graph.list().len(), 1);
    }

    #[test]
    fn test_clear_then_rewire() {
        let graph = WiringGraph::new();
        graph.set_wiring(edge("c", "llm", "p1")).unwrap();
        assert!(graph.clear_wiring(&InstanceConfigId::new("c"), "llm"));
        graph.set_wiring(edge("c", "llm", "p2")).unwrap();

        assert_eq!(
            graph.provider_for(&InstanceConfigId::new("c"), "llm"),
            Some(InstanceConfigId::new("p2"))
        );
        assert!(!graph.clear_wiring(&InstanceConfigId::new("c"), "db"));
    }

    #[test]
    fn test_slots_are_independent() {
        let graph = WiringGraph::new();
        graph.set_wiring(edge("c", "llm", "p1")).unwrap();
        graph.set_wiring(edge("c", "vector-db", "p2")).unwrap();
        graph.set_wiring(edge("other", "llm", "p3")).unwrap();
        assert_eq!(graph.list().len(), 3);
    }
}
