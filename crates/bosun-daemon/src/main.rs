//! Bosun Daemon - Configuration resolution and deployment orchestration
//!
//! The daemon provides:
//! - REST API for deployment, wiring and debug-resolution operations
//! - Layered settings resolution with provenance
//! - Deployment backends for container hosts and Kubernetes clusters
//! - Deployment tracking with per-id operation serialization

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod server;

use config::DaemonConfig;
use error::DaemonResult;
use server::Server;

/// Bosun Daemon CLI
#[derive(Parser)]
#[command(name = "bosund")]
#[command(about = "Bosun Daemon - Configuration resolution and deployment orchestration", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BOSUN_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "BOSUN_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "BOSUN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "BOSUN_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| error::DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| error::DaemonError::Config(format!("Invalid listen address: {e}")))?;
    }

    println!(
        r#"
  bosund - Bosun deployment orchestrator
  Version:   {}
  Listening: {}
  Targets:   {}
"#,
        env!("CARGO_PKG_VERSION"),
        config.server.listen_addr,
        config.seed.targets.len(),
    );

    // Create and run server
    let server = Server::new(config)?;
    server.run().await
}
