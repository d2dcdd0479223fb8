//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Deployments
        .route("/deployments", get(handlers::list_deployments))
        .route("/deployments", post(handlers::create_deployment))
        .route("/deployments/:id", get(handlers::get_deployment))
        .route("/deployments/:id", delete(handlers::remove_deployment))
        .route("/deployments/:id/status", get(handlers::deployment_status))
        .route("/deployments/:id/stop", post(handlers::stop_deployment))
        .route("/deployments/:id/logs", get(handlers::deployment_logs))
        // Targets
        .route("/targets", get(handlers::list_targets))
        // Capability wiring
        .route("/wiring", get(handlers::list_wiring))
        .route("/wiring", put(handlers::set_wiring))
        .route(
            "/wiring/:consumer/:capability",
            delete(handlers::clear_wiring),
        )
        // Debug resolution (the UI collaborator's read surface)
        .route("/resolve", post(handlers::resolve_setting))
        .route("/resolve/all", post(handlers::resolve_all_settings));

    // Build router with middleware
    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
