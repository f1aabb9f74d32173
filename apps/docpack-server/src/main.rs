//! Docpack Server
//!
//! Turns one spreadsheet record into a ZIP of filled-in DOCX/PDF documents.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docpack_server::catalog::TemplateCatalog;
use docpack_server::config::Config;
use docpack_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "docpack_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    tracing::info!("Starting Docpack Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Asset directory: {}", config.assets.base_dir.display());
    tracing::info!("PDF converter: {}", config.converter.soffice_bin);

    let catalog = TemplateCatalog::load(&config.assets.catalog_path, &config.assets.base_dir)
        .with_context(|| format!("Failed to load template catalog {}", config.assets.catalog_path.display()))?;
    tracing::info!("Template catalog loaded with {} templates", catalog.len());

    for template in catalog.templates() {
        if !template.source.is_file() {
            tracing::warn!("Template {} is missing at {}", template.id, template.source.display());
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;

    // Create application state
    let app = docpack_server::app(AppState::new(config, catalog));

    // Start server with graceful shutdown
    tracing::info!("Docpack Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
