//! Remote deployment agent client
//!
//! A remote container host runs a small agent exposing a deploy API; the
//! resolved definition travels as the JSON request body. Network and agent
//! errors are deployment failures, never partial successes — a failed call
//! requires a fresh deploy attempt.

use crate::error::{classify_http_error, DeployError, Result};
use bosun_types::{DeploymentId, DeploymentStatus, ResolvedServiceDefinition};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

/// HTTP client for remote deployment agents
pub struct AgentClient {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AgentStatusResponse {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentLogsResponse {
    lines: Vec<String>,
}

impl AgentClient {
    /// `timeout` bounds every agent call.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::Backend(format!("agent client: {e}")))?;
        Ok(Self { client })
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: String,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    pub async fn deploy(
        &self,
        endpoint: &str,
        token: Option<&str>,
        id: &DeploymentId,
        definition: &ResolvedServiceDefinition,
    ) -> Result<serde_json::Value> {
        let body = json!({
            "deployment_id": id.to_string(),
            "definition": definition,
        });

        self.request(
            reqwest::Method::POST,
            format!("{endpoint}/api/v1/deployments"),
            token,
        )
        .json(&body)
        .send()
        .await
        .map_err(|e| classify_http_error("agent deploy", e))?
        .error_for_status()
        .map_err(|e| classify_http_error("agent deploy", e))?;

        info!(deployment = %id, %endpoint, "dispatched to remote agent");
        Ok(json!({ "agent_endpoint": endpoint, "remote_id": id.to_string() }))
    }

    pub async fn status(
        &self,
        endpoint: &str,
        token: Option<&str>,
        id: &DeploymentId,
    ) -> Result<DeploymentStatus> {
        let response: AgentStatusResponse = self
            .request(
                reqwest::Method::GET,
                format!("{endpoint}/api/v1/deployments/{id}"),
                token,
            )
            .send()
            .await
            .map_err(|e| classify_http_error("agent status", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("agent status", e))?
            .json()
            .await
            .map_err(|e| classify_http_error("agent status", e))?;

        let status = match response.status.as_str() {
            "pending" | "deploying" => DeploymentStatus::Deploying,
            "running" => DeploymentStatus::Running,
            "stopped" => DeploymentStatus::Stopped,
            "failed" => DeploymentStatus::failed(
                response.reason.unwrap_or_else(|| "agent reported failure".into()),
            ),
            other => {
                return Err(DeployError::Backend(format!(
                    "agent reported unknown status '{other}'"
                )));
            }
        };
        Ok(status)
    }

    pub async fn stop(&self, endpoint: &str, token: Option<&str>, id: &DeploymentId) -> Result<()> {
        self.request(
            reqwest::Method::POST,
            format!("{endpoint}/api/v1/deployments/{id}/stop"),
            token,
        )
        .send()
        .await
        .map_err(|e| classify_http_error("agent stop", e))?
        .error_for_status()
        .map_err(|e| classify_http_error("agent stop", e))?;
        Ok(())
    }

    pub async fn remove(
        &self,
        endpoint: &str,
        token: Option<&str>,
        id: &DeploymentId,
    ) -> Result<()> {
        self.request(
            reqwest::Method::DELETE,
            format!("{endpoint}/api/v1/deployments/{id}"),
            token,
        )
        .send()
        .await
        .map_err(|e| classify_http_error("agent remove", e))?
        .error_for_status()
        .map_err(|e| classify_http_error("agent remove", e))?;
        Ok(())
    }

    pub async fn logs(
        &self,
        endpoint: &str,
        token: Option<&str>,
        id: &DeploymentId,
    ) -> Result<Vec<String>> {
        let response: AgentLogsResponse = self
            .request(
                reqwest::Method::GET,
                format!("{endpoint}/api/v1/deployments/{id}/logs"),
                token,
            )
            .send()
            .await
            .map_err(|e| classify_http_error("agent logs", e))?
            .error_for_status()
            .map_err(|e| classify_http_error("agent logs", e))?
            .json()
            .await
            .map_err(|e| classify_http_error("agent logs", e))?;
        Ok(response.lines)
    }
}
