//! Container-host backend
//!
//! Local targets drive the container runtime's documented REST API
//! directly through the [`ContainerRuntime`] seam; remote targets hand the
//! resolved definition to a deployment agent over HTTP. Either way a
//! failed call leaves the deployment failed — there is no mid-flight
//! recovery, a fresh deploy is a new attempt.

use crate::backend::agent::AgentClient;
use crate::backend::DeploymentBackend;
use crate::error::{classify_http_error, DeployError, Result};
use crate::target::{DeployTarget, TargetConnection};
use async_trait::async_trait;
use bosun_types::{DeploymentId, DeploymentRecord, DeploymentStatus, ResolvedServiceDefinition};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Observed state of a container on its host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Creating,
    Running,
    Exited { code: i64 },
    Dead { detail: String },
}

impl ContainerState {
    fn into_status(self) -> DeploymentStatus {
        match self {
            ContainerState::Creating => DeploymentStatus::Deploying,
            ContainerState::Running => DeploymentStatus::Running,
            ContainerState::Exited { code: 0 } => DeploymentStatus::Stopped,
            ContainerState::Exited { code } => {
                DeploymentStatus::failed(format!("container exited with code {code}"))
            }
            ContainerState::Dead { detail } => DeploymentStatus::failed(detail),
        }
    }
}

/// Seam over a container runtime's documented API
///
/// The production implementation speaks the engine's REST API; tests
/// substitute their own.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container; returns the runtime's container id
    async fn run(
        &self,
        engine_url: &str,
        name: &str,
        definition: &ResolvedServiceDefinition,
    ) -> Result<String>;

    async fn inspect(&self, engine_url: &str, container_id: &str) -> Result<ContainerState>;

    async fn stop(&self, engine_url: &str, container_id: &str) -> Result<()>;

    async fn remove(&self, engine_url: &str, container_id: &str) -> Result<()>;

    async fn logs(&self, engine_url: &str, container_id: &str) -> Result<Vec<String>>;
}

/// Container-host deployment backend, covering local and agent-fronted
/// targets
pub struct ContainerBackend {
    runtime: Arc<dyn ContainerRuntime>,
    agent: AgentClient,
}

#[derive(Debug, Deserialize)]
struct ContainerMetadata {
    container_id: String,
}

impl ContainerBackend {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, agent: AgentClient) -> Self {
        Self { runtime, agent }
    }

    fn container_id(record: &DeploymentRecord) -> Result<String> {
        let meta: ContainerMetadata = serde_json::from_value(record.backend_metadata.clone())
            .map_err(|_| {
                DeployError::Backend(format!(
                    "record {} carries no container metadata",
                    record.id
                ))
            })?;
        Ok(meta.container_id)
    }
}

#[async_trait]
impl DeploymentBackend for ContainerBackend {
    #[instrument(skip(self, definition), fields(deployment = %id))]
    async fn deploy(
        &self,
        target: &DeployTarget,
        definition: &ResolvedServiceDefinition,
        id: &DeploymentId,
    ) -> Result<(serde_json::Value, DeploymentStatus)> {
        match &target.connection {
            TargetConnection::LocalHost { engine_url } => {
                let name = format!("bosun-{}", id.as_uuid().simple());
                let container_id = self.runtime.run(engine_url, &name, definition).await?;
                info!(%container_id, "container started");
                Ok((
                    json!({ "container_id": container_id, "name": name }),
                    DeploymentStatus::Running,
                ))
            }
            TargetConnection::RemoteAgent { endpoint, token } => {
                let metadata = self
                    .agent
                    .deploy(endpoint, token.as_deref(), id, definition)
                    .await?;
                // The agent confirmed dispatch, not completion; status
                // polls take it from here.
                Ok((metadata, DeploymentStatus::Deploying))
            }
            TargetConnection::Cluster(_) => Err(DeployError::InvalidTarget(format!(
                "target {} is not a container host",
                target.id
            ))),
        }
    }

    async fn status(
        &self,
        target: &DeployTarget,
        record: &DeploymentRecord,
    ) -> Result<DeploymentStatus> {
        match &target.connection {
            TargetConnection::LocalHost { engine_url } => {
                let container_id = Self::container_id(record)?;
                let state = self.runtime.inspect(engine_url, &container_id).await?;
                Ok(state.into_status())
            }
            TargetConnection::RemoteAgent { endpoint, token } => {
                self.agent.status(endpoint, token.as_deref(), &record.id).await
            }
            TargetConnection::Cluster(_) => Err(DeployError::InvalidTarget(format!(
                "target {} is not a container host",
                target.id
            ))),
        }
    }

    async fn stop(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<()> {
        match &target.connection {
            TargetConnection::LocalHost { engine_url } => {
                let container_id = Self::container_id(record)?;
                self.runtime.stop(engine_url, &container_id).await
            }
            TargetConnection::RemoteAgent { endpoint, token } => {
                self.agent.stop(endpoint, token.as_deref(), &record.id).await
            }
            TargetConnection::Cluster(_) => Err(DeployError::InvalidTarget(format!(
                "target {} is not a container host",
                target.id
            ))),
        }
    }

    async fn remove(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<()> {
        match &target.connection {
            TargetConnection::LocalHost { engine_url } => {
                let container_id = Self::container_id(record)?;
                self.runtime.remove(engine_url, &container_id).await
            }
            TargetConnection::RemoteAgent { endpoint, token } => {
                self.agent.remove(endpoint, token.as_deref(), &record.id).await
            }
            TargetConnection::Cluster(_) => Err(DeployError::InvalidTarget(format!(
                "target {} is not a container host",
                target.id
            ))),
        }
    }

    async fn logs(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<Vec<String>> {
        match &target.connection {
            TargetConnection::LocalHost { engine_url } => {
                let container_id = Self::container_id(record)?;
                self.runtime.logs(engine_url, &container_id).await
            }
            TargetConnection::RemoteAgent { endpoint, token } => {
                self.agent.logs(endpoint, token.as_deref(), &record.id).await
            }
            TargetConnection::Cluster(_) => Err(DeployError::InvalidTarget(format!(
                "target {} is not a container host",
                target.id
            ))),
        }
    }
}

/// Production [`ContainerRuntime`] speaking the engine's REST API
pub struct HttpEngineRuntime {
    client: reqwest::Client,
}

impl HttpEngineRuntime {
    /// `timeout` bounds every engine call; unbounded blocking on an
    /// externally-reachable endpoint is not permitted.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Backend(format!("engine client: {e}")))?;
        Ok(Self { client })
    }
}

#[derive(Debug, Deserialize)]
struct CreateContainerResponse {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct InspectResponse {
    #[serde(rename = "State")]
    state: InspectState,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "ExitCode", default)]
    exit_code: i64,
    #[serde(rename = "Error", default)]
    error: String,
}

#[async_trait]
impl ContainerRuntime for HttpEngineRuntime {
    async fn run(
        &self,
        engine_url: &str,
        name: &str,
        definition: &ResolvedServiceDefinition,
    ) -> Result<String> {
        let env: Vec<String> = definition
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let exposed: serde_json::Map<String, serde_json::Value> = definition
            .ports
            .iter()
            .map(|p| {
                (
                    format!("{}/{}", p.container_port, p.protocol),
                    json!({}),
                )
            })
            .collect();
        let binds: Vec<String> = definition
            .volumes
            .iter()
            .map(|v| {
                if v.read_only {
                    format!("{}:{}:ro", v.source, v.mount_path)
                } else {
                    format!("{}:{}", v.source, v.mount_path)
                }
            })
            .collect();

        let body = json!({
            "Image": definition.image,
            "Cmd": definition.command,
            "Env": env,
            "ExposedPorts": exposed,
            "HostConfig": { "Binds": binds },
        });

        let created: CreateContainerResponse = self
            .client
            .post(format!("{engine_url}/containers/create"))
            .query(&[("name", name)])
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_http_error("container create", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("container create", e))?
            .json()
            .await
            .map_err(|e| classify_http_error("container create", e))?;

        self.client
            .post(format!("{engine_url}/containers/{}/start", created.id))
            .send()
            .await
            .map_err(|e| classify_http_error("container start", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("container start", e))?;

        Ok(created.id)
    }

    async fn inspect(&self, engine_url: &str, container_id: &str) -> Result<ContainerState> {
        let inspected: InspectResponse = self
            .client
            .get(format!("{engine_url}/containers/{container_id}/json"))
            .send()
            .await
            .map_err(|e| classify_http_error("container inspect", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("container inspect", e))?
            .json()
            .await
            .map_err(|e| classify_http_error("container inspect", e))?;

        let state = match inspected.state.status.as_str() {
            "created" | "restarting" => ContainerState::Creating,
            "running" | "paused" => ContainerState::Running,
            "exited" => ContainerState::Exited {
                code: inspected.state.exit_code,
            },
            _ => ContainerState::Dead {
                detail: if inspected.state.error.is_empty() {
                    format!("container state '{}'", inspected.state.status)
                } else {
                    inspected.state.error
                },
            },
        };
        Ok(state)
    }

    async fn stop(&self, engine_url: &str, container_id: &str) -> Result<()> {
        self.client
            .post(format!("{engine_url}/containers/{container_id}/stop"))
            .send()
            .await
            .map_err(|e| classify_http_error("container stop", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("container stop", e))?;
        Ok(())
    }

    async fn remove(&self, engine_url: &str, container_id: &str) -> Result<()> {
        self.client
            .delete(format!("{engine_url}/containers/{container_id}"))
            .query(&[("v", "true")])
            .send()
            .await
            .map_err(|e| classify_http_error("container remove", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("container remove", e))?;
        Ok(())
    }

    async fn logs(&self, engine_url: &str, container_id: &str) -> Result<Vec<String>> {
        let raw = self
            .client
            .get(format!("{engine_url}/containers/{container_id}/logs"))
            .query(&[("stdout", "true"), ("stderr", "true"), ("tail", "200")])
            .send()
            .await
            .map_err(|e| classify_http_error("container logs", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("container logs", e))?
            .bytes()
            .await
            .map_err(|e| classify_http_error("container logs", e))?;

        // The log endpoint multiplexes streams with 8-byte frame headers;
        // lossy text with headers stripped is enough for an operator view.
        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(|line| line.trim_start_matches(|c: char| c.is_control()).to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }
}
