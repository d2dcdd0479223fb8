//! Bosun Deploy - Deployment resolution, backends and tracking
//!
//! The pipeline: a deployment request names a service and a target.
//! [`resolution::DeploymentResolver`] turns the service's declared shape
//! plus resolver output into a variable-free definition;
//! [`orchestrator::Orchestrator`] records it and hands it to the backend
//! selected by the target's family; [`tracker::DeploymentTracker`]
//! persists the record and serializes mutating operations per deployment
//! id.
//!
//! ## Key Principle
//!
//! The resolved definition is backend-agnostic by construction. Backends
//! differ only in how they execute it and in the opaque metadata they
//! store on the record for their own future calls.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod orchestrator;
pub mod resolution;
pub mod target;
pub mod tracker;

pub use backend::{
    AgentClient, ClusterApi, ClusterBackend, ContainerBackend, ContainerRuntime,
    DeploymentBackend, HttpClusterApi, HttpEngineRuntime,
};
pub use error::{DeployError, Result};
pub use orchestrator::{BackendSet, Orchestrator};
pub use resolution::DeploymentResolver;
pub use target::{ClusterConnection, DeployTarget, TargetCatalog, TargetConnection};
pub use tracker::{DeploymentTracker, MemoryTrackerStore, TrackerStore};
