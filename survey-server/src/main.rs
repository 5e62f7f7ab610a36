//! survey-server - backend for the audio-text matching survey
//!
//! Persists per-participant progress under a data folder and serves the
//! aggregated results as JSON and CSV.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use survey_common::config::{ConfigOverrides, ServerConfig};
use survey_server::store::SessionStore;
use survey_server::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for survey-server
#[derive(Parser, Debug)]
#[command(name = "survey-server")]
#[command(about = "Session store and results export for the audio-text matching survey")]
#[command(version)]
struct Args {
    /// Base storage directory (holds sessions/ and results.csv)
    #[arg(short, long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "SURVEY_HOST")]
    host: Option<String>,

    /// Directory with the survey front end, served for non-API paths
    #[arg(long, env = "SURVEY_SITE_ROOT")]
    site_root: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "SURVEY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "survey_server=info,survey_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting survey-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = ServerConfig::resolve(ConfigOverrides {
        data_dir: args.data_dir,
        host: args.host,
        port: args.port,
        site_root: args.site_root,
        config_file: args.config,
    });

    info!("Data folder: {}", config.data_dir.display());
    info!("Sessions: {}", config.sessions_dir().display());
    info!("CSV export: {}", config.results_csv_path().display());
    if let Some(root) = &config.site_root {
        info!("Serving static site from {}", root.display());
    }

    let store = SessionStore::open(&config.data_dir)
        .await
        .context("Failed to open session store")?;

    let state = AppState::new(store).with_site_root(config.site_root.clone());
    let app = build_router(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;
    info!("survey-server listening on http://{}", bind_addr);

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
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
