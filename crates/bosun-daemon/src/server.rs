//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use bosun_deploy::{
    AgentClient, BackendSet, ClusterBackend, ContainerBackend, DeploymentResolver,
    DeploymentTracker, HttpClusterApi, HttpEngineRuntime, MemoryTrackerStore, Orchestrator,
    TargetCatalog,
};
use bosun_registry::MemoryServiceRegistry;
use bosun_settings::{documents, MemoryValueStore, SettingsResolver, WiringGraph};
use bosun_types::ServiceShape;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Bosun Daemon Server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration, seeding the
    /// value store, registry and target catalog.
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let store = Arc::new(MemoryValueStore::new());
        let registry = Arc::new(MemoryServiceRegistry::new());
        let wiring = Arc::new(WiringGraph::new());

        // Seed value-store documents
        for seed in &config.seed.documents {
            let raw = std::fs::read_to_string(&seed.path).map_err(|e| {
                DaemonError::Seed(format!("document '{}' ({}): {}", seed.document, seed.path, e))
            })?;
            store.load_yaml(&seed.document, &raw).map_err(|e| {
                DaemonError::Seed(format!("document '{}': {}", seed.document, e))
            })?;
        }

        // Snapshot the process environment into its layer. Resolution
        // reads this document, not ambient std::env, so resolves stay
        // reproducible and testable.
        if config.seed.capture_process_env {
            let env_tree: serde_json::Map<String, serde_json::Value> = std::env::vars()
                .map(|(key, value)| (key, serde_json::Value::String(value)))
                .collect();
            store.insert_document(documents::PROCESS_ENV, serde_json::Value::Object(env_tree));
        }

        // Seed service shapes
        for path in &config.seed.service_files {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| DaemonError::Seed(format!("service file {path}: {e}")))?;
            let shapes: Vec<ServiceShape> = serde_yaml::from_str(&raw)
                .map_err(|e| DaemonError::Seed(format!("service file {path}: {e}")))?;
            for shape in shapes {
                tracing::debug!(service = %shape.id, "registered service shape");
                registry.insert(shape);
            }
        }

        // Seed target catalog
        let targets = Arc::new(TargetCatalog::new());
        for target in &config.seed.targets {
            targets
                .insert(target.clone())
                .map_err(|e| DaemonError::Config(e.to_string()))?;
        }

        let settings = Arc::new(SettingsResolver::new(
            store.clone(),
            wiring.clone(),
            registry.clone(),
        ));

        // Backends share one bounded timeout for all external calls
        let timeout = Duration::from_secs(config.backends.http_timeout_secs);
        let container = ContainerBackend::new(
            Arc::new(
                HttpEngineRuntime::new(timeout)
                    .map_err(|e| DaemonError::Config(e.to_string()))?,
            ),
            AgentClient::new(timeout).map_err(|e| DaemonError::Config(e.to_string()))?,
        );
        let cluster = ClusterBackend::new(Arc::new(
            HttpClusterApi::new(timeout).map_err(|e| DaemonError::Config(e.to_string()))?,
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            DeploymentResolver::new(registry.clone(), settings.clone()),
            Arc::new(DeploymentTracker::new(Arc::new(MemoryTrackerStore::new()))),
            targets,
            BackendSet {
                container: Arc::new(container),
                cluster: Arc::new(cluster),
            },
        ));

        let state = AppState::new(orchestrator, wiring, settings, registry);

        Ok(Self { config, state })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state);

        let listener = TcpListener::bind(addr).await?;

        tracing::info!("bosun daemon listening on {}", addr);
        tracing::info!(
            targets = self.config.seed.targets.len(),
            "target catalog loaded"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("bosun daemon shutting down");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
