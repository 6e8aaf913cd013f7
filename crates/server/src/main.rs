use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convertino_core::{load_config, validate_config, Converter, FfmpegConverter, PresetCatalog};
use convertino_server::{create_router, AppState, WsBroadcaster};

/// How often expired batches are swept from memory.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CONVERTINO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("FFmpeg path: {:?}", config.converter.ffmpeg_path);
    info!(
        "Parallel conversions: {}",
        config.converter.max_parallel_conversions
    );

    let presets =
        PresetCatalog::with_configured(&config.presets).context("Invalid preset configuration")?;
    info!("{} presets available", presets.presets().len());

    // Create converter. A missing ffmpeg is reported per file, so the
    // server still starts.
    let converter = FfmpegConverter::new(config.converter.clone());
    match converter.validate().await {
        Ok(()) => info!("FFmpeg is available"),
        Err(e) => warn!("FFmpeg check failed, conversions will fail: {}", e),
    }
    let converter: Arc<dyn Converter> = Arc::new(converter);

    // Create WebSocket broadcaster for progress updates
    let ws_broadcaster = WsBroadcaster::default();

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        presets,
        converter,
        ws_broadcaster,
    ));

    let sweeper = state.store().spawn_sweeper(SWEEP_INTERVAL);
    info!(
        "Finished batches kept for {}s (at most {})",
        config.retention.ttl_secs, config.retention.max_batches
    );

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    sweeper.abort();

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
