//! Kubernetes cluster backend
//!
//! One resolved definition becomes exactly three artifacts — a
//! configuration-values ConfigMap, a workload Deployment, and a
//! network-exposure Service — applied as one logical unit in that order.
//! A partial apply surfaces as a failure carrying the applied-artifact
//! list, so `remove` cleans up exactly what exists and nothing else.

use crate::backend::DeploymentBackend;
use crate::error::{classify_http_error, DeployError, Result};
use crate::target::{ClusterConnection, DeployTarget, TargetConnection};
use async_trait::async_trait;
use bosun_types::{DeploymentId, DeploymentRecord, DeploymentStatus, ResolvedServiceDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// One generated cluster artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterArtifact {
    pub step: u32,
    pub kind: String,
    pub name: String,
}

/// Metadata the cluster backend stores on a record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClusterMetadata {
    release: String,
    artifacts: Vec<ClusterArtifact>,
    applied_steps: Vec<u32>,
}

/// Seam over the cluster's documented API
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create or replace one manifest
    async fn apply(&self, conn: &ClusterConnection, manifest: &Value) -> Result<()>;

    /// Delete one object by kind and name
    async fn delete(&self, conn: &ClusterConnection, kind: &str, name: &str) -> Result<()>;

    /// Observed status of a workload
    async fn workload_status(
        &self,
        conn: &ClusterConnection,
        name: &str,
    ) -> Result<DeploymentStatus>;

    /// Scale a workload's replica count
    async fn scale(&self, conn: &ClusterConnection, name: &str, replicas: u32) -> Result<()>;

    /// Recent log lines from the workload's pods
    async fn workload_logs(&self, conn: &ClusterConnection, name: &str) -> Result<Vec<String>>;
}

/// Cluster deployment backend
pub struct ClusterBackend {
    api: Arc<dyn ClusterApi>,
}

impl ClusterBackend {
    pub fn new(api: Arc<dyn ClusterApi>) -> Self {
        Self { api }
    }

    fn connection(target: &DeployTarget) -> Result<&ClusterConnection> {
        match &target.connection {
            TargetConnection::Cluster(conn) => Ok(conn),
            _ => Err(DeployError::InvalidTarget(format!(
                "target {} is not a cluster",
                target.id
            ))),
        }
    }

    fn metadata(record: &DeploymentRecord) -> Result<ClusterMetadata> {
        serde_json::from_value(record.backend_metadata.clone()).map_err(|_| {
            DeployError::Backend(format!("record {} carries no cluster metadata", record.id))
        })
    }

    /// Deterministic release name for one deployment attempt
    fn release_name(definition: &ResolvedServiceDefinition, id: &DeploymentId) -> String {
        let short = id.as_uuid().simple().to_string();
        format!("bosun-{}-{}", definition.service_id, &short[..8])
    }

    /// The three artifacts, in apply order
    fn manifests(
        definition: &ResolvedServiceDefinition,
        namespace: &str,
        release: &str,
    ) -> Vec<(ClusterArtifact, Value)> {
        let config_name = format!("{release}-config");
        let labels = json!({ "app": release });

        let config_data: serde_json::Map<String, Value> = definition
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.render())))
            .collect();

        let config_map = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": config_name, "namespace": namespace, "labels": labels },
            "data": config_data,
        });

        let env: Vec<Value> = definition
            .env
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();
        let container_ports: Vec<Value> = definition
            .ports
            .iter()
            .map(|p| {
                json!({
                    "containerPort": p.container_port,
                    "protocol": p.protocol.to_uppercase(),
                })
            })
            .collect();

        let mut container = json!({
            "name": definition.service_id.to_string(),
            "image": definition.image,
            "env": env,
            "envFrom": [ { "configMapRef": { "name": config_name } } ],
            "ports": container_ports,
        });
        if !definition.command.is_empty() {
            container["command"] = json!(definition.command);
        }

        let workload = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": { "name": release, "namespace": namespace, "labels": labels },
            "spec": {
                "replicas": 1,
                "selector": { "matchLabels": labels },
                "template": {
                    "metadata": { "labels": labels },
                    "spec": { "containers": [ container ] },
                },
            },
        });

        let service_ports: Vec<Value> = definition
            .ports
            .iter()
            .map(|p| {
                json!({
                    "name": p.name.clone().unwrap_or_else(|| format!("port-{}", p.container_port)),
                    "port": p.container_port,
                    "targetPort": p.container_port,
                    "protocol": p.protocol.to_uppercase(),
                })
            })
            .collect();

        let exposure = json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": release, "namespace": namespace, "labels": labels },
            "spec": { "selector": labels, "ports": service_ports },
        });

        vec![
            (
                ClusterArtifact {
                    step: 1,
                    kind: "ConfigMap".into(),
                    name: config_name,
                },
                config_map,
            ),
            (
                ClusterArtifact {
                    step: 2,
                    kind: "Deployment".into(),
                    name: release.to_string(),
                },
                workload,
            ),
            (
                ClusterArtifact {
                    step: 3,
                    kind: "Service".into(),
                    name: release.to_string(),
                },
                exposure,
            ),
        ]
    }
}

#[async_trait]
impl DeploymentBackend for ClusterBackend {
    #[instrument(skip(self, definition), fields(deployment = %id))]
    async fn deploy(
        &self,
        target: &DeployTarget,
        definition: &ResolvedServiceDefinition,
        id: &DeploymentId,
    ) -> Result<(Value, DeploymentStatus)> {
        let conn = Self::connection(target)?;
        let release = Self::release_name(definition, id);
        let manifests = Self::manifests(definition, &conn.namespace, &release);

        let mut applied: Vec<ClusterArtifact> = Vec::new();
        for (artifact, manifest) in &manifests {
            if let Err(err) = self.api.apply(conn, manifest).await {
                let applied_steps: Vec<u32> = applied.iter().map(|a| a.step).collect();
                let metadata = serde_json::to_value(ClusterMetadata {
                    release: release.clone(),
                    artifacts: applied.clone(),
                    applied_steps: applied_steps.clone(),
                })
                .unwrap_or(Value::Null);
                warn!(
                    step = artifact.step,
                    kind = %artifact.kind,
                    "manifest apply failed after {} of {} artifacts",
                    applied.len(),
                    manifests.len()
                );
                return Err(DeployError::PartialApply {
                    detail: format!(
                        "{} '{}' (step {}): {}",
                        artifact.kind, artifact.name, artifact.step, err
                    ),
                    applied_steps,
                    metadata,
                });
            }
            applied.push(artifact.clone());
        }

        info!(%release, "applied {} cluster artifacts", applied.len());
        let applied_steps: Vec<u32> = applied.iter().map(|a| a.step).collect();
        let metadata = serde_json::to_value(ClusterMetadata {
            release,
            artifacts: applied,
            applied_steps,
        })
        .map_err(|e| DeployError::Backend(format!("metadata encode: {e}")))?;

        // Manifests are accepted; the workload is still rolling out.
        Ok((metadata, DeploymentStatus::Deploying))
    }

    async fn status(
        &self,
        target: &DeployTarget,
        record: &DeploymentRecord,
    ) -> Result<DeploymentStatus> {
        let conn = Self::connection(target)?;
        let metadata = Self::metadata(record)?;
        self.api.workload_status(conn, &metadata.release).await
    }

    async fn stop(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<()> {
        let conn = Self::connection(target)?;
        let metadata = Self::metadata(record)?;
        self.api.scale(conn, &metadata.release, 0).await
    }

    /// Deletes only the artifacts the deploy actually applied, in reverse
    /// apply order.
    async fn remove(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<()> {
        let conn = Self::connection(target)?;
        let metadata = Self::metadata(record)?;

        let mut artifacts = metadata.artifacts;
        artifacts.sort_by(|a, b| b.step.cmp(&a.step));
        for artifact in artifacts {
            self.api.delete(conn, &artifact.kind, &artifact.name).await?;
        }
        Ok(())
    }

    async fn logs(&self, target: &DeployTarget, record: &DeploymentRecord) -> Result<Vec<String>> {
        let conn = Self::connection(target)?;
        let metadata = Self::metadata(record)?;
        self.api.workload_logs(conn, &metadata.release).await
    }
}

/// Production [`ClusterApi`] speaking the cluster's REST API
pub struct HttpClusterApi {
    client: reqwest::Client,
}

impl HttpClusterApi {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Backend(format!("cluster client: {e}")))?;
        Ok(Self { client })
    }

    fn collection_path(conn: &ClusterConnection, kind: &str) -> Result<String> {
        let path = match kind {
            "ConfigMap" => format!(
                "{}/api/v1/namespaces/{}/configmaps",
                conn.api_url, conn.namespace
            ),
            "Deployment" => format!(
                "{}/apis/apps/v1/namespaces/{}/deployments",
                conn.api_url, conn.namespace
            ),
            "Service" => format!(
                "{}/api/v1/namespaces/{}/services",
                conn.api_url, conn.namespace
            ),
            other => {
                return Err(DeployError::Backend(format!(
                    "unsupported artifact kind '{other}'"
                )));
            }
        };
        Ok(path)
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        conn: &ClusterConnection,
    ) -> reqwest::RequestBuilder {
        match &conn.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkloadStatusResponse {
    #[serde(default)]
    status: WorkloadStatusFields,
}

#[derive(Debug, Default, Deserialize)]
struct WorkloadStatusFields {
    #[serde(rename = "availableReplicas", default)]
    available_replicas: u32,
    #[serde(rename = "replicas", default)]
    replicas: u32,
}

#[derive(Debug, Deserialize)]
struct PodList {
    items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: PodMetadata,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn apply(&self, conn: &ClusterConnection, manifest: &Value) -> Result<()> {
        let kind = manifest["kind"].as_str().ok_or_else(|| {
            DeployError::Backend("manifest missing 'kind'".to_string())
        })?;
        let path = Self::collection_path(conn, kind)?;

        self.authorized(self.client.post(path), conn)
            .json(manifest)
            .send()
            .await
            .map_err(|e| classify_http_error("cluster apply", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("cluster apply", e))?;
        Ok(())
    }

    async fn delete(&self, conn: &ClusterConnection, kind: &str, name: &str) -> Result<()> {
        let path = format!("{}/{}", Self::collection_path(conn, kind)?, name);
        self.authorized(self.client.delete(path), conn)
            .send()
            .await
            .map_err(|e| classify_http_error("cluster delete", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("cluster delete", e))?;
        Ok(())
    }

    async fn workload_status(
        &self,
        conn: &ClusterConnection,
        name: &str,
    ) -> Result<DeploymentStatus> {
        let path = format!(
            "{}/apis/apps/v1/namespaces/{}/deployments/{}",
            conn.api_url, conn.namespace, name
        );
        let workload: WorkloadStatusResponse = self
            .authorized(self.client.get(path), conn)
            .send()
            .await
            .map_err(|e| classify_http_error("workload status", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("workload status", e))?
            .json()
            .await
            .map_err(|e| classify_http_error("workload status", e))?;

        let status = if workload.status.available_replicas > 0 {
            DeploymentStatus::Running
        } else if workload.status.replicas == 0 {
            DeploymentStatus::Stopped
        } else {
            DeploymentStatus::Deploying
        };
        Ok(status)
    }

    async fn scale(&self, conn: &ClusterConnection, name: &str, replicas: u32) -> Result<()> {
        let path = format!(
            "{}/apis/apps/v1/namespaces/{}/deployments/{}",
            conn.api_url, conn.namespace, name
        );
        let patch = json!({ "spec": { "replicas": replicas } });
        self.authorized(self.client.patch(path), conn)
            .header(reqwest::header::CONTENT_TYPE, "application/merge-patch+json")
            .json(&patch)
            .send()
            .await
            .map_err(|e| classify_http_error("workload scale", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("workload scale", e))?;
        Ok(())
    }

    async fn workload_logs(&self, conn: &ClusterConnection, name: &str) -> Result<Vec<String>> {
        let pods_path = format!("{}/api/v1/namespaces/{}/pods", conn.api_url, conn.namespace);
        let pods: PodList = self
            .authorized(self.client.get(pods_path), conn)
            .query(&[("labelSelector", format!("app={name}"))])
            .send()
            .await
            .map_err(|e| classify_http_error("pod list", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("pod list", e))?
            .json()
            .await
            .map_err(|e| classify_http_error("pod list", e))?;

        let Some(pod) = pods.items.first() else {
            return Ok(Vec::new());
        };
        let log_path = format!(
            "{}/api/v1/namespaces/{}/pods/{}/log",
            conn.api_url, conn.namespace, pod.metadata.name
        );
        let text = self
            .authorized(self.client.get(log_path), conn)
            .query(&[("tailLines", "200")])
            .send()
            .await
            .map_err(|e| classify_http_error("pod logs", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("pod logs", e))?
            .text()
            .await
            .map_err(|e| classify_http_error("pod logs", e))?;
        Ok(text.lines().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_types::{PortSpec, ServiceId};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn definition() -> ResolvedServiceDefinition {
        let mut variables = BTreeMap::new();
        variables.insert("PORT".into(), bosun_types::ResolvedValue::Num(8080.0));
        ResolvedServiceDefinition {
            service_id: ServiceId::new("svc"),
            image: "registry.local/svc:1.2.3".into(),
            command: vec![],
            env: BTreeMap::new(),
            ports: vec![PortSpec {
                name: None,
                container_port: 8080,
                protocol: "tcp".into(),
            }],
            volumes: vec![],
            variables,
        }
    }

    fn cluster_target() -> DeployTarget {
        DeployTarget {
            id: "cluster-a.k8s.prod".parse().unwrap(),
            connection: TargetConnection::Cluster(ClusterConnection {
                api_url: "https://cluster:6443".into(),
                namespace: "default".into(),
                token: None,
            }),
        }
    }

    /// Fails at a configured apply step; records every delete
    struct ScriptedApi {
        fail_at_step: Option<usize>,
        applies: Mutex<Vec<String>>,
        deletes: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedApi {
        fn new(fail_at_step: Option<usize>) -> Self {
            Self {
                fail_at_step,
                applies: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ClusterApi for ScriptedApi {
        async fn apply(&self, _conn: &ClusterConnection, manifest: &Value) -> Result<()> {
            let mut applies = self.applies.lock().unwrap();
            let step = applies.len() + 1;
            if self.fail_at_step == Some(step) {
                return Err(DeployError::BackendRejected("admission denied".into()));
            }
            applies.push(manifest["kind"].as_str().unwrap_or("?").to_string());
            Ok(())
        }

        async fn delete(&self, _conn: &ClusterConnection, kind: &str, name: &str) -> Result<()> {
            self.deletes
                .lock()
                .unwrap()
                .push((kind.to_string(), name.to_string()));
            Ok(())
        }

        async fn workload_status(
            &self,
            _conn: &ClusterConnection,
            _name: &str,
        ) -> Result<DeploymentStatus> {
            Ok(DeploymentStatus::Running)
        }

        async fn scale(&self, _conn: &ClusterConnection, _name: &str, _replicas: u32) -> Result<()> {
            Ok(())
        }

        async fn workload_logs(
            &self,
            _conn: &ClusterConnection,
            _name: &str,
        ) -> Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_full_apply_records_three_artifacts() {
        let api = Arc::new(ScriptedApi::new(None));
        let backend = ClusterBackend::new(api.clone());

        let (metadata, status) = backend
            .deploy(&cluster_target(), &definition(), &DeploymentId::generate())
            .await
            .unwrap();

        assert_eq!(
            api.applies.lock().unwrap().as_slice(),
            ["ConfigMap", "Deployment", "Service"]
        );
        assert_eq!(metadata["applied_steps"], json!([1, 2, 3]));
        assert_eq!(status, DeploymentStatus::Deploying);
    }

    #[tokio::test]
    async fn test_partial_apply_surfaces_applied_steps() {
        // Step 2 of 3 fails: the failure must carry applied_steps = [1].
        let api = Arc::new(ScriptedApi::new(Some(2)));
        let backend = ClusterBackend::new(api);

        let err = backend
            .deploy(&cluster_target(), &definition(), &DeploymentId::generate())
            .await
            .unwrap_err();

        match err {
            DeployError::PartialApply {
                applied_steps,
                metadata,
                ..
            } => {
                assert_eq!(applied_steps, vec![1]);
                assert_eq!(metadata["applied_steps"], json!([1]));
                assert_eq!(metadata["artifacts"][0]["kind"], json!("ConfigMap"));
            }
            other => panic!("expected partial apply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remove_cleans_only_applied_artifacts() {
        let api = Arc::new(ScriptedApi::new(Some(2)));
        let backend = ClusterBackend::new(api.clone());
        let id = DeploymentId::generate();

        let err = backend
            .deploy(&cluster_target(), &definition(), &id)
            .await
            .unwrap_err();
        let DeployError::PartialApply { metadata, .. } = err else {
            panic!("expected partial apply");
        };

        // Record failed with the partial metadata, then remove.
        let mut record = DeploymentRecord::new(
            id,
            ServiceId::new("svc"),
            "cluster-a.k8s.prod".parse().unwrap(),
            definition(),
        );
        record.backend_metadata = metadata;
        record.transition(DeploymentStatus::failed("partial apply"));

        backend.remove(&cluster_target(), &record).await.unwrap();

        let deletes = api.deletes.lock().unwrap();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].0, "ConfigMap");
    }

    #[tokio::test]
    async fn test_manifest_shapes() {
        let release = "bosun-svc-0000abcd";
        let manifests = ClusterBackend::manifests(&definition(), "default", release);
        assert_eq!(manifests.len(), 3);

        let (_, workload) = &manifests[1];
        assert_eq!(workload["kind"], json!("Deployment"));
        assert_eq!(
            workload["spec"]["template"]["spec"]["containers"][0]["image"],
            json!("registry.local/svc:1.2.3")
        );
        assert_eq!(
            workload["spec"]["template"]["spec"]["containers"][0]["envFrom"][0]["configMapRef"]
                ["name"],
            json!(format!("{release}-config"))
        );

        let (_, config) = &manifests[0];
        assert_eq!(config["data"]["PORT"], json!("8080"));

        let (_, service) = &manifests[2];
        assert_eq!(service["spec"]["ports"][0]["port"], json!(8080));
    }
}
