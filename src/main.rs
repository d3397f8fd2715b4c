//! Sticky-session HTTP load balancer.
//!
//! Loads configuration, starts the proxy listener, the health probe, and the
//! optional admin and metrics endpoints, then runs until SIGINT or SIGTERM.

use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;

use sticky_lb::config::loader::{load_server_list, read_config, ConfigError};
use sticky_lb::config::validation::validate_config;
use sticky_lb::config::ProxyConfig;
use sticky_lb::lifecycle::{wait_for_signal, Shutdown};
use sticky_lb::observability::{logging, metrics};
use sticky_lb::HttpServer;

const DEFAULT_SERVER_LIST: &str = "serverlist.json";

#[derive(Parser, Debug)]
#[command(name = "sticky-lb")]
#[command(about = "HTTP load balancer with weighted round-robin and session affinity", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON array of backend addresses. Replaces `backends` from the config file.
    #[arg(short, long)]
    servers: Option<PathBuf>,

    /// Listen on 0.0.0.0:<PORT> instead of the configured bind address.
    #[arg(short, long)]
    port: Option<u16>,
}

fn build_config(args: &Args) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };

    match &args.servers {
        Some(path) => config.backends = load_server_list(path)?,
        None if config.backends.is_empty() => {
            config.backends = load_server_list(Path::new(DEFAULT_SERVER_LIST))?;
        }
        None => {}
    }

    if let Some(port) = args.port {
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = build_config(&args)?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sticky-lb starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        probe_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;
    let shutdown = Shutdown::new();
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
