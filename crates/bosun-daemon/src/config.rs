//! Configuration for bosun-daemon

use bosun_deploy::DeployTarget;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Backend client configuration
    #[serde(default)]
    pub backends: BackendsConfig,

    /// Seed data loaded at startup
    #[serde(default)]
    pub seed: SeedConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            backends: BackendsConfig::default(),
            seed: SeedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".parse().unwrap(),
            enable_cors: true,
        }
    }
}

/// Backend HTTP client configuration
///
/// One bounded timeout governs every externally-reachable call (engine,
/// agent, cluster API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
        }
    }
}

/// One value-store document seeded from a YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSeed {
    /// Store document name, e.g. `defaults` or `deploy_env`
    pub document: String,
    pub path: String,
}

/// Seed data configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Value-store documents to load at startup
    #[serde(default)]
    pub documents: Vec<DocumentSeed>,

    /// YAML files each holding a list of service shapes
    #[serde(default)]
    pub service_files: Vec<String>,

    /// Known deployment targets
    #[serde(default)]
    pub targets: Vec<DeployTarget>,

    /// Capture the daemon's process environment into the process-env
    /// layer at startup
    #[serde(default = "default_true")]
    pub capture_process_env: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with BOSUN_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("BOSUN")
                .separator("_")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(config.server.enable_cors);
        assert_eq!(config.backends.http_timeout_secs, 30);
        assert!(config.seed.targets.is_empty());
    }

    #[test]
    fn test_seed_config_parses_targets() {
        let raw = r#"
seed:
  capture_process_env: false
  documents:
    - document: defaults
      path: /etc/bosun/defaults.yaml
  targets:
    - id: worker-1.container.prod
      connection:
        kind: remote_agent
        endpoint: http://worker-1:7000
    - id: cluster-a.k8s.prod
      connection:
        kind: cluster
        api_url: https://cluster-a:6443
        namespace: services
"#;
        let config: DaemonConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.seed.targets.len(), 2);
        assert!(!config.seed.capture_process_env);
        assert_eq!(config.seed.documents[0].document, "defaults");
    }
}
