use std::sync::Arc;

use anyhow::Context;
use vidblur_common::config::AppConfig;
use vidblur_common::logging::init_logging;
use vidblur_mask_model::VideoLibrary;
use vidblur_processing::Processor;
use vidblur_render_engine::{FfmpegBackend, RenderBackend};

use vidblur_server::config::ServerConfig;
use vidblur_server::router::build_app_router;
use vidblur_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let app_config = AppConfig::load();
    init_logging(&app_config.logging);
    let config = ServerConfig::from_env(&app_config)?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        library = %config.library_dir.display(),
        "Loaded server configuration"
    );

    // --- Library and backend ---
    let library = VideoLibrary::open(&config.library_dir).with_context(|| {
        format!("Failed to open library at {}", config.library_dir.display())
    })?;

    let backend = FfmpegBackend::new(config.encoder.ffmpeg_bin.clone());
    if !backend.is_available() {
        tracing::warn!(
            ffmpeg = %config.encoder.ffmpeg_bin,
            "ffmpeg not found; processing requests will fail"
        );
    }

    let processor = Processor::new(library, Arc::new(backend), config.encoder.clone());
    let recovered = processor.recover_interrupted()?;
    if !recovered.is_empty() {
        tracing::warn!(count = recovered.len(), "Marked interrupted jobs as failed");
    }

    // --- Router ---
    let addr = config.bind_address();
    let app = build_app_router(AppState::new(processor, config));

    // --- Start server ---
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
