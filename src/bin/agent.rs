use std::env;
use std::path::{Path, PathBuf};

use clap::Parser;
use clap::builder::FalseyValueParser;
use tracing_subscriber::EnvFilter;

use fleetmend::{Agent, AgentOptions};
use fleetmend_domain::FleetmendConfig;

/// Detects unhealthy services, hosts and pods and applies guarded fixes.
#[derive(Debug, Parser)]
#[command(name = "fleetmend-agent", version)]
struct Cli {
    /// YAML config file.
    #[arg(long, env = "FLEETMEND_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Run every selected sweep once and exit.
    #[arg(long, env = "RUN_ONCE", value_parser = FalseyValueParser::new())]
    once: bool,

    /// Restrict the agent to one sweep (service, metrics, disk, network, pods, cluster).
    #[arg(long, env = "ONLY")]
    only: Option<String>,

    /// Force dry-run for every domain.
    #[arg(long, env = "DRY_RUN", value_parser = FalseyValueParser::new())]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config_path);
    let config = load_config(&config_path);

    let options = AgentOptions {
        once: cli.once,
        only: cli.only.map(|only| only.trim().to_ascii_lowercase()),
        dry_run: cli.dry_run,
    };
    let agent = Agent::build(&config, &options).await?;
    agent.run(shutdown_signal()).await;
    Ok(())
}

fn config_path() -> PathBuf {
    if let Ok(home) = env::var("HOME") {
        let path = Path::new(&home).join(".fleetmend").join("config.yaml");
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("fleetmend-config.yaml")
}

/// A broken config file never stops the agent; it falls back to the
/// defaults with every domain in dry-run.
fn load_config(path: &Path) -> FleetmendConfig {
    match FleetmendConfig::load_from_path(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "config loaded");
            config
        }
        Err(e) => {
            tracing::warn!("{:#}, using defaults in dry-run", e);
            let mut config = FleetmendConfig::default();
            config.agent.dry_run = true;
            config
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
