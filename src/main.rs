//! Asset Cache - a versioned, cache-first proxy for content-hashed bundles
//!
//! Runs the cache worker behind a local HTTP proxy in front of the origin.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asset_cache::api::create_router;
use asset_cache::{spawn_cleanup_task, AppState, CacheWorker, Config};

/// Main entry point for the asset cache proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the worker with persistent (or in-memory) storage and an HTTP fetcher
/// 4. Install, then activate at once since install asks to skip waiting
/// 5. Start background expiry cleanup task
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "asset_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting asset cache proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache={}, dir={:?}, origin={}, port={}, timeout={}s, cleanup_interval={}s",
        config.cache_generation_name,
        config.cache_dir,
        config.origin,
        config.server_port,
        config.cache_timeout_seconds,
        config.cleanup_interval
    );

    let state = AppState::from_config(&config)
        .await
        .context("failed to build cache worker")?;

    // Lifecycle failures are logged and retried through /_worker/
    if let Err(e) = start_worker(&state.worker).await {
        warn!("Worker not active at startup: {}", e);
    }

    let cleanup_handle = spawn_cleanup_task(
        state.worker.storage().clone(),
        state.worker.cache_name().to_string(),
        config.cleanup_interval,
    );
    info!("Background cleanup task started");

    let worker = state.worker.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Proxy listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    worker.flush_pending_writes().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Installs the worker and activates it when install asks to skip waiting.
async fn start_worker(worker: &Arc<CacheWorker>) -> asset_cache::Result<()> {
    let report = worker.on_install().await?;
    info!(
        "Install finished: {} of {} bundles cached",
        report.cached.len(),
        report.discovered.len()
    );

    if worker.skip_waiting_requested() {
        let activation = worker.on_activate().await?;
        info!(
            "Activated {}, removed {} old generation(s)",
            activation.cache_name,
            activation.deleted.len()
        );
    }
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
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
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("Cleanup task aborted");
}
