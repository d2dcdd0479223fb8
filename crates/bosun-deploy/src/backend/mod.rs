//! Deployment backend abstraction
//!
//! One uniform interface per target family. Selection is a pure function
//! of the target's declared family — never inferred from the resolved
//! definition, which is backend-agnostic by construction.

pub mod agent;
pub mod cluster;
pub mod container;

use crate::error::Result;
use crate::target::DeployTarget;
use async_trait::async_trait;
use bosun_types::{DeploymentId, DeploymentRecord, DeploymentStatus, ResolvedServiceDefinition};

pub use agent::AgentClient;
pub use cluster::{ClusterApi, ClusterBackend, HttpClusterApi};
pub use container::{ContainerBackend, ContainerRuntime, ContainerState, HttpEngineRuntime};

/// Uniform deployment interface, implemented once per target family
///
/// `deploy` returns the backend's opaque metadata for the record plus the
/// initial observed status — `Running` when the backend saw the workload
/// start, `Deploying` when it only confirmed dispatch. Every other call
/// receives the record back and may read only its own metadata from it.
/// Cancellation of an in-progress call does not roll back work already
/// dispatched — the next `status` call reconciles external state.
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Execute one resolved definition on the target
    async fn deploy(
        &self,
        target: &DeployTarget,
        definition: &ResolvedServiceDefinition,
        id: &DeploymentId,
    ) -> Result<(serde_json::Value, DeploymentStatus)>;

    /// Current status as observed on the target
    async fn status(&self, target: &DeployTarget, record: &DeploymentRecord)
        -> Result<DeploymentStatus>;

    async fn stop(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<()>;

    /// Clean up the target-side artifacts this backend created. For
    /// partially-applied deployments only the recorded artifacts are
    /// touched.
    async fn remove(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<()>;

    async fn logs(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<Vec<String>>;
}
