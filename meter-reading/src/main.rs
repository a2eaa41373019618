//! meter-reading - Meter Reading service
//!
//! Startup order:
//! 1. Parse CLI, load TOML bootstrap config (missing file → defaults)
//! 2. Initialize tracing (RUST_LOG wins over the configured level)
//! 3. Resolve root folder and create artifacts/staging directories
//! 4. Resolve recognition API key and build the Gemini client
//! 5. Serve HTTP until Ctrl+C / SIGTERM

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meter_common::config::{self, RootFolderLayout};
use meter_reading::services::{GeminiRecognizer, ImageCodec};
use meter_reading::{build_router, AppState};

/// Command-line arguments for meter-reading
#[derive(Parser, Debug)]
#[command(name = "meter-reading")]
#[command(about = "Meter reading recognition and confirmation service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "METER_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for stored images (overrides METER_ROOT_FOLDER and TOML)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides TOML)
    #[arg(short, long, env = "METER_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let config_exists = config_path.exists();
    let mut toml_config = config::load_toml_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(port) = args.port {
        toml_config.port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "meter_reading={level},meter_common={level},tower_http={level}",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting meter-reading v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if config_exists {
        info!("Config file: {}", config_path.display());
    } else {
        warn!(
            "Config file {} not found, using built-in defaults",
            config_path.display()
        );
    }

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let layout = RootFolderLayout::new(root_folder);
    layout
        .ensure_directories()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", layout.root().display());

    let api_key = config::resolve_recognition_api_key(&toml_config)?;
    let recognizer = GeminiRecognizer::new(&toml_config.recognition, api_key)
        .context("Failed to build recognition client")?;
    info!("Recognition model: {}", toml_config.recognition.model);

    let public_base_url = toml_config.public_base_url();
    let state = AppState::new(
        Arc::new(recognizer),
        ImageCodec::new(&layout),
        public_base_url.clone(),
    )
    .with_max_upload_bytes(toml_config.max_upload_bytes);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", toml_config.bind_address, toml_config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}", toml_config.bind_address))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("meter-reading listening on http://{}", addr);
    info!("Image URLs served under {}/images/", public_base_url);

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
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
