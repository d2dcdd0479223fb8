//! Deployment management handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bosun_deploy::DeployTarget;
use bosun_types::{
    DeploymentId, DeploymentRecord, DeploymentStatus, InstanceConfigId, ServiceId, TargetId,
};
use serde::{Deserialize, Serialize};

/// Deployment request
#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub service_id: String,
    pub target_id: String,
    #[serde(default)]
    pub instance_config_id: Option<String>,
}

/// Deployment request response
///
/// Returned once the backend call has been dispatched, not completed;
/// callers poll the status endpoint.
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub deployment_id: String,
    pub status: DeploymentStatus,
}

/// Create a new deployment
pub async fn create_deployment(
    State(state): State<AppState>,
    Json(request): Json<DeployRequest>,
) -> ApiResult<(StatusCode, Json<DeployResponse>)> {
    let service_id = ServiceId::new(&request.service_id);
    let target_id: TargetId = request
        .target_id
        .parse()
        .map_err(|e: bosun_types::TargetIdParseError| ApiError::BadRequest(e.to_string()))?;
    let instance = request.instance_config_id.map(InstanceConfigId::new);

    // Resolution happens synchronously so missing-configuration errors
    // reach the caller; the backend call runs in the background.
    let record = state
        .orchestrator
        .prepare_deploy(&service_id, &target_id, instance.as_ref())
        .await?;

    let orchestrator = state.orchestrator.clone();
    let id = record.id.clone();
    tokio::spawn(async move {
        if let Err(err) = orchestrator.execute_deploy(&id).await {
            tracing::warn!(deployment = %id, error = %err, "deployment attempt failed");
        }
    });

    tracing::info!(
        deployment = %record.id,
        service = %request.service_id,
        target = %request.target_id,
        "deployment dispatched"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DeployResponse {
            deployment_id: record.id.to_string(),
            status: record.status,
        }),
    ))
}

/// List query
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub service_id: String,
}

/// List deployments for a service
pub async fn list_deployments(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DeploymentRecord>>> {
    let records = state
        .orchestrator
        .list_by_service(&ServiceId::new(&query.service_id))
        .await?;
    Ok(Json(records))
}

/// Get a deployment record as stored
pub async fn get_deployment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeploymentRecord>> {
    let id = parse_deployment_id(&id)?;
    Ok(Json(state.orchestrator.get(&id).await?))
}

/// Get a deployment's status, reconciled against the backend
pub async fn deployment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeploymentRecord>> {
    let id = parse_deployment_id(&id)?;
    Ok(Json(state.orchestrator.status(&id).await?))
}

/// Stop a running deployment
pub async fn stop_deployment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeploymentRecord>> {
    let id = parse_deployment_id(&id)?;
    let record = state.orchestrator.stop(&id).await?;
    tracing::info!(deployment = %id, "stopped deployment");
    Ok(Json(record))
}

/// Remove a stopped or failed deployment's artifacts
pub async fn remove_deployment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeploymentRecord>> {
    let id = parse_deployment_id(&id)?;
    let record = state.orchestrator.remove(&id).await?;
    tracing::info!(deployment = %id, "removed deployment");
    Ok(Json(record))
}

/// Log lines response
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub lines: Vec<String>,
}

/// Recent logs for a deployment
pub async fn deployment_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LogsResponse>> {
    let id = parse_deployment_id(&id)?;
    let lines = state.orchestrator.logs(&id).await?;
    Ok(Json(LogsResponse { lines }))
}

/// Known deployment targets
pub async fn list_targets(State(state): State<AppState>) -> ApiResult<Json<Vec<DeployTarget>>> {
    Ok(Json(state.orchestrator.targets().list()))
}

/// Helper to parse a deployment ID from a path segment
fn parse_deployment_id(id: &str) -> ApiResult<DeploymentId> {
    DeploymentId::parse(id)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid deployment ID: {id}")))
}
