//! Deployment target catalog
//!
//! A target pairs a structured id with connection details for its backend
//! family. The id alone selects the backend; the connection tells that
//! backend how to reach the execution environment.

use crate::error::{DeployError, Result};
use bosun_types::{TargetFamily, TargetId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Connection details for a Kubernetes cluster target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConnection {
    /// Cluster API server base URL
    pub api_url: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// How to reach a target's execution environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetConnection {
    /// Container runtime reachable directly over its documented REST API
    LocalHost { engine_url: String },

    /// Container host fronted by a remote deployment agent
    RemoteAgent {
        endpoint: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Kubernetes cluster driven via generated manifests
    Cluster(ClusterConnection),
}

impl TargetConnection {
    /// The backend family this connection belongs to
    pub fn family(&self) -> TargetFamily {
        match self {
            TargetConnection::LocalHost { .. } | TargetConnection::RemoteAgent { .. } => {
                TargetFamily::Container
            }
            TargetConnection::Cluster(_) => TargetFamily::Kubernetes,
        }
    }
}

/// One addressable execution environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTarget {
    pub id: TargetId,
    pub connection: TargetConnection,
}

impl DeployTarget {
    /// The id's family and the connection kind must agree; backend
    /// selection depends only on the id.
    pub fn validate(&self) -> Result<()> {
        if self.id.family() != self.connection.family() {
            return Err(DeployError::InvalidTarget(format!(
                "target {} declares family '{}' but its connection is for '{}'",
                self.id,
                self.id.family(),
                self.connection.family()
            )));
        }
        Ok(())
    }
}

/// In-memory catalog of known targets, seeded from daemon configuration
#[derive(Default)]
pub struct TargetCatalog {
    targets: DashMap<TargetId, DeployTarget>,
}

impl TargetCatalog {
    pub fn new() -> Self {
        Self {
            targets: DashMap::new(),
        }
    }

    pub fn insert(&self, target: DeployTarget) -> Result<()> {
        target.validate()?;
        self.targets.insert(target.id.clone(), target);
        Ok(())
    }

    pub fn get(&self, id: &TargetId) -> Option<DeployTarget> {
        self.targets.get(id).map(|t| t.clone())
    }

    pub fn list(&self) -> Vec<DeployTarget> {
        self.targets.iter().map(|t| t.value().clone()).collect()
    }
}
