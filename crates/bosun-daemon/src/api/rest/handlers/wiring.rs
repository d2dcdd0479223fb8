//! Capability wiring handlers

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use bosun_types::{InstanceConfigId, WiringEdge};
use serde::Serialize;

/// All active wiring edges
pub async fn list_wiring(State(state): State<AppState>) -> ApiResult<Json<Vec<WiringEdge>>> {
    Ok(Json(state.wiring.list()))
}

/// Set wiring response
#[derive(Debug, Serialize)]
pub struct SetWiringResponse {
    pub wired: bool,
}

/// Wire a consumer's capability slot to a provider.
///
/// Rejected with a conflict when the slot already holds a different
/// provider; clear the slot first.
pub async fn set_wiring(
    State(state): State<AppState>,
    Json(edge): Json<WiringEdge>,
) -> ApiResult<Json<SetWiringResponse>> {
    let consumer = edge.consumer_instance_id.clone();
    let capability = edge.consumer_capability.clone();
    state.wiring.set_wiring(edge)?;

    tracing::info!(%consumer, %capability, "capability wired");
    Ok(Json(SetWiringResponse { wired: true }))
}

/// Clear wiring response
#[derive(Debug, Serialize)]
pub struct ClearWiringResponse {
    pub cleared: bool,
}

/// Clear a consumer's capability slot
pub async fn clear_wiring(
    State(state): State<AppState>,
    Path((consumer, capability)): Path<(String, String)>,
) -> ApiResult<Json<ClearWiringResponse>> {
    let cleared = state
        .wiring
        .clear_wiring(&InstanceConfigId::new(consumer), &capability);
    Ok(Json(ClearWiringResponse { cleared }))
}
