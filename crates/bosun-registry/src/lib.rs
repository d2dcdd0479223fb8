//! Bosun Registry - Read-only service shape lookup
//!
//! The registry is an external collaborator: something else discovers
//! which services exist and what they declare. This crate pins down the
//! read contract the rest of Bosun depends on, plus an in-memory
//! implementation for tests, development, and config-seeded daemons.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod registry;

pub use error::{RegistryError, Result};
pub use memory::MemoryServiceRegistry;
pub use registry::ServiceRegistry;
