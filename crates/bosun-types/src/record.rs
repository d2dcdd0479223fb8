//! Deployment records and the deployment status state machine
//!
//! One record per deployment attempt, shared across all backend kinds.
//! Records are soft state: stopping a deployment keeps its record until an
//! explicit remove.

use crate::ids::{DeploymentId, ServiceId};
use crate::shape::ResolvedServiceDefinition;
use crate::target::{TargetFamily, TargetId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle state of a deployment
///
/// `Pending → Deploying → Running → {Stopped, Failed}`;
/// `Stopped → Removing → Removed`; `Failed` is terminal except for remove —
/// a re-deploy is a fresh attempt under a new id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Recorded, backend call not yet dispatched
    Pending,

    /// Backend call dispatched, not yet confirmed running
    Deploying,

    Running,

    Stopped,

    /// Terminal for this attempt; `reason` is operator-facing
    Failed { reason: String },

    Removing,

    Removed,
}

impl DeploymentStatus {
    pub fn failed(reason: impl Into<String>) -> Self {
        DeploymentStatus::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Failed { .. } | DeploymentStatus::Removed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Stopped => "stopped",
            DeploymentStatus::Failed { .. } => "failed",
            DeploymentStatus::Removing => "removing",
            DeploymentStatus::Removed => "removed",
        }
    }

    /// Whether `operation` may begin from this state.
    ///
    /// An operation attempted from an incompatible state fails immediately;
    /// nothing is queued.
    pub fn permits(&self, operation: DeploymentOperation) -> bool {
        match operation {
            DeploymentOperation::Deploy => matches!(self, DeploymentStatus::Pending),
            DeploymentOperation::Stop => matches!(self, DeploymentStatus::Running),
            DeploymentOperation::Remove => matches!(
                self,
                DeploymentStatus::Stopped | DeploymentStatus::Failed { .. }
            ),
        }
    }

}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutating operations serialized per deployment id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentOperation {
    Deploy,
    Stop,
    Remove,
}

impl fmt::Display for DeploymentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentOperation::Deploy => "deploy",
            DeploymentOperation::Stop => "stop",
            DeploymentOperation::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// Rejected state transition
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("operation '{operation}' not permitted from state '{from}'")]
pub struct InvalidTransition {
    pub from: String,
    pub operation: DeploymentOperation,
}

impl InvalidTransition {
    pub fn new(from: &DeploymentStatus, operation: DeploymentOperation) -> Self {
        Self {
            from: from.as_str().to_string(),
            operation,
        }
    }
}

/// Persisted state of one deployment attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub service_id: ServiceId,
    pub target_id: TargetId,
    pub status: DeploymentStatus,

    /// Backend family that owns this record
    pub backend: TargetFamily,

    /// Opaque per-backend state, threaded back into the backend's own
    /// future calls (status checks, stop, logs, cleanup). The tracker
    /// never interprets it.
    #[serde(default)]
    pub backend_metadata: serde_json::Value,

    /// Snapshot of the definition this attempt deployed
    pub resolved_config: ResolvedServiceDefinition,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl DeploymentRecord {
    pub fn new(
        id: DeploymentId,
        service_id: ServiceId,
        target_id: TargetId,
        resolved_config: ResolvedServiceDefinition,
    ) -> Self {
        let now = chrono::Utc::now();
        let backend = target_id.family();
        Self {
            id,
            service_id,
            target_id,
            status: DeploymentStatus::Pending,
            backend,
            backend_metadata: serde_json::Value::Null,
            resolved_config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status transition, bumping `updated_at`
    pub fn transition(&mut self, status: DeploymentStatus) {
        self.status = status;
        self.updated_at = chrono::Utc::now();
    }
}
