//! REST API handlers

mod deployments;
mod health;
mod resolve;
mod wiring;

pub use deployments::{
    create_deployment, deployment_logs, deployment_status, get_deployment, list_deployments,
    list_targets, remove_deployment, stop_deployment,
};
pub use health::health_check;
pub use resolve::{resolve_all_settings, resolve_setting};
pub use wiring::{clear_wiring, list_wiring, set_wiring};
