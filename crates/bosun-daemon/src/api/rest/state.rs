//! Application state for API handlers

use bosun_deploy::Orchestrator;
use bosun_registry::ServiceRegistry;
use bosun_settings::{SettingsResolver, WiringGraph};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Deployment orchestrator
    pub orchestrator: Arc<Orchestrator>,

    /// Capability wiring graph
    pub wiring: Arc<WiringGraph>,

    /// Settings resolver (debug-resolution endpoints)
    pub settings: Arc<SettingsResolver>,

    /// Service shape registry
    pub registry: Arc<dyn ServiceRegistry>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        wiring: Arc<WiringGraph>,
        settings: Arc<SettingsResolver>,
        registry: Arc<dyn ServiceRegistry>,
    ) -> Self {
        Self {
            orchestrator,
            wiring,
            settings,
            registry,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }
}
