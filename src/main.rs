//! webserver: serve a health endpoint over HTTP or HTTPS.
//!
//! This is the binary entry point. It initializes tracing, loads configuration
//! from a TOML file, asks the configured certificate provider for a TLS
//! configuration, assembles the server and runs it until SIGTERM/SIGINT.

use std::time::Duration;

use axum::routing::get;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webserver::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use webserver::http::{self, shutdown};
use webserver::{Server, ServerError, Service};

/// webserver: a single-port HTTP(S) server
#[derive(Parser, Debug)]
#[command(name = "webserver", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Port to listen on, overrides http.port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level filter (e.g., "webserver=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

/// Liveness probe.
async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        provider = ?config.tls.provider,
        domains = ?config.tls.domains,
        "Loaded configuration"
    );

    let tls = tokio::time::timeout(
        Duration::from_secs(60),
        config.tls.provider().provide(&config.tls.domains),
    )
    .await
    .map_err(|_| "certificate provider timed out")?
    .map_err(ServerError::from)?;

    let mut options = config.server_options();
    options.push(http::services([Service::new("health", "/health", get(health))]));
    options.push(http::tls_config(tls));

    let server = Server::new(options)?;
    shutdown::setup_shutdown_handler(server.handle(), shutdown::DEFAULT_GRACE_PERIOD);

    let port = args.port.unwrap_or(config.http.port);
    server.run(port).await?;

    tracing::info!("Server stopped");
    Ok(())
}
