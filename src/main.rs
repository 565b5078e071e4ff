//! pulsecheck: a dependency health probe aggregator.
//!
//! This is the application entry point. It initializes tracing, loads
//! configuration from TOML files, builds the probe registry and its
//! endpoint table, sets up the Axum router, and starts the HTTP server
//! with graceful shutdown.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulsecheck::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use pulsecheck::http::start_server;
use pulsecheck::probe::ProbeRegistry;
use pulsecheck::routes::create_router;
use pulsecheck::state::AppState;

/// pulsecheck: dependency health probes over HTTP
#[derive(Parser, Debug)]
#[command(name = "pulsecheck", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "pulsecheck=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration before tracing init: the log format comes from it
    let config = AppConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Loaded configuration");

    // Log configured probes
    for probe in &config.probe {
        tracing::info!(
            name = %probe.name,
            kind = %probe.kind,
            timeout_s = probe.timeout(&config.probes).as_secs(),
            "Probe configured"
        );
    }
    if config.probe.is_empty() {
        tracing::warn!("No probes configured; aggregate health is vacuously healthy");
    }

    // Build the probe registry and its endpoint table
    let probes = ProbeRegistry::from_config(&config)?;
    tracing::info!(probes = ?probes.names(), "Initialized probe registry");

    // Create application state and router
    let state = AppState::new(config.clone(), probes);
    let app = create_router(state);

    // Start server (blocks until shutdown)
    start_server(app, &config).await?;

    Ok(())
}
