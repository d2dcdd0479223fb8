//! Settings error types

use bosun_types::InstanceConfigId;
use thiserror::Error;

/// Value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document could not be parsed as a key/value tree
    #[error("document parse error: {0}")]
    Parse(String),

    /// Backing storage failed
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Resolution errors
///
/// A missing value is not an error — it surfaces as `found = false` in the
/// result. These are authoring or infrastructure defects.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A reference chain revisited a path; the chain names the cycle
    #[error("cyclic reference: {}", .chain.join(" -> "))]
    CyclicReference { chain: Vec<String> },

    /// A reference chain exceeded the fixed depth bound
    #[error("reference depth exceeded ({max}): {}", .chain.join(" -> "))]
    ReferenceDepthExceeded { chain: Vec<String>, max: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A collaborator source (registry-backed layer) failed
    #[error("layer source error: {0}")]
    Source(String),
}

/// Wiring graph errors
#[derive(Debug, Error)]
pub enum WiringError {
    /// The (consumer, capability) slot already has a different provider.
    /// Clear the slot first; wiring is a function, not a multi-map.
    #[error(
        "capability slot ({consumer}, {capability}) is already wired to {existing_provider}"
    )]
    SlotOccupied {
        consumer: InstanceConfigId,
        capability: String,
        existing_provider: InstanceConfigId,
    },
}
