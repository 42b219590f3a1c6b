//! feelsat-pd - Satisfaction prediction service
//!
//! Trains one satisfaction model per configured city at startup, then
//! serves `POST /postData` and forwards every prediction to the downstream
//! automation flow.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use feelsat_common::config::{load_config, CONFIG_ENV_VAR};
use feelsat_pd::forward::Forwarder;
use feelsat_pd::registry::ModelRegistry;
use feelsat_pd::AppState;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for feelsat-pd
#[derive(Parser, Debug)]
#[command(name = "feelsat-pd")]
#[command(about = "Satisfaction prediction service")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides `service.bind_addr`)
    #[arg(short, long, env = "FEELSAT_BIND_ADDR")]
    bind: Option<String>,

    /// Downstream URL receiving predictions (overrides `service.forward_url`)
    #[arg(long, env = "FEELSAT_FORWARD_URL")]
    forward_url: Option<String>,

    /// Do not forward predictions
    #[arg(long, conflicts_with = "forward_url")]
    no_forward: bool,

    /// Dump raw request points here (overrides `service.points_dump_dir`)
    #[arg(long)]
    points_dump_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = loaded.config;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting feelsat-pd (Satisfaction prediction)");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &loaded.source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: compiled defaults"),
    }

    // Train city models, city by city
    info!(kind = ?config.model.kind, cities = config.cities.len(), "Training models");
    let registry = ModelRegistry::train_all(&config.cities, &config.model);
    if registry.is_empty() {
        warn!("No city model could be loaded; every prediction will return 404");
    } else {
        info!("Models loaded for: {}", registry.cities().join(", "));
    }

    let forward_url = if args.no_forward {
        None
    } else {
        args.forward_url.or(config.service.forward_url.clone())
    };
    match &forward_url {
        Some(url) => info!("Forwarding predictions to {}", url),
        None => info!("Forwarding disabled"),
    }
    let forwarder = Forwarder::new(
        forward_url,
        Duration::from_secs(config.service.forward_timeout_secs),
    )
    .context("Failed to create forwarding client")?;

    let state = AppState::new(registry, forwarder)
        .with_points_dump_dir(args.points_dump_dir.or(config.service.points_dump_dir.clone()));

    let app = feelsat_pd::build_router(state);

    let bind_addr = args.bind.unwrap_or(config.service.bind_addr.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
