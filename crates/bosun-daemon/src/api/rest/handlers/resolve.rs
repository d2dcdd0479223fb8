//! Debug-resolution handlers
//!
//! The read surface for anything that wants to see effective
//! configuration with provenance — notably the configuration UI, which
//! displays resolved values and their source layers.

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, Json};
use bosun_types::{InstanceConfigId, ResolutionContext, ResolutionResult, ServiceId, TargetId};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub name: String,
    pub service_id: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub instance_config_id: Option<String>,
}

/// Resolve one variable with provenance
pub async fn resolve_setting(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<ResolutionResult>> {
    let ctx = build_context(
        &request.service_id,
        request.target_id.as_deref(),
        request.instance_config_id.as_deref(),
    )?;
    let result = state.settings.resolve(&request.name, &ctx).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ResolveAllRequest {
    pub service_id: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub instance_config_id: Option<String>,

    /// Defaults to the service's declared variables
    #[serde(default)]
    pub names: Option<Vec<String>>,
}

/// Resolve a batch of variables with provenance
pub async fn resolve_all_settings(
    State(state): State<AppState>,
    Json(request): Json<ResolveAllRequest>,
) -> ApiResult<Json<BTreeMap<String, ResolutionResult>>> {
    let service_id = ServiceId::new(&request.service_id);
    let ctx = build_context(
        &request.service_id,
        request.target_id.as_deref(),
        request.instance_config_id.as_deref(),
    )?;

    let names = match request.names {
        Some(names) => names,
        None => {
            let shape = state
                .registry
                .get_service_shape(&service_id)
                .await?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Service {} not found", request.service_id))
                })?;
            shape.declared_var_names()
        }
    };

    let results = state.settings.resolve_all(&ctx, &names).await?;
    Ok(Json(results))
}

fn build_context(
    service_id: &str,
    target_id: Option<&str>,
    instance_config_id: Option<&str>,
) -> ApiResult<ResolutionContext> {
    let mut ctx = ResolutionContext::service(ServiceId::new(service_id));
    if let Some(raw) = target_id {
        let target: TargetId = raw
            .parse()
            .map_err(|e: bosun_types::TargetIdParseError| ApiError::BadRequest(e.to_string()))?;
        ctx = ctx.with_target(target);
    }
    if let Some(instance) = instance_config_id {
        ctx = ctx.with_instance(InstanceConfigId::new(instance));
    }
    Ok(ctx)
}
