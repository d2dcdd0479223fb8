//! Bosun Settings - Layered configuration resolution
//!
//! Three pieces live here, leaves first:
//!
//! - **Value Store**: named configuration documents as nested key/value
//!   trees. Pure storage, no resolution logic.
//! - **Capability Wiring Graph**: explicit (consumer, capability) → provider
//!   edges, one active edge per slot.
//! - **Settings Resolver**: walks the fixed layer order applicable to a
//!   resolution context, returns the highest-precedence value with
//!   provenance, and dereferences `@settings.` expressions with cycle
//!   detection.
//!
//! Resolution is a pure read of current store state. Concurrent edits may
//! yield different snapshots across calls; no caching hides that.

#![deny(unsafe_code)]

pub mod error;
pub mod resolver;
pub mod store;
pub mod wiring;

pub use error::{ResolutionError, StoreError, WiringError};
pub use resolver::{ServiceSettingsSource, SettingsResolver, MAX_REFERENCE_DEPTH};
pub use store::{documents, MemoryValueStore, StoreResult, ValueStore};
pub use wiring::WiringGraph;
