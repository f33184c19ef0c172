//! claimd claim controller
//!
//! Reconciles sandbox claims against warm sandbox pools and serves health
//! probes and the claim admission check.

use std::sync::Arc;

use anyhow::Result;
use claimd_controller::{
    api,
    claim::ClaimControl,
    config,
    reconciler::ClaimReconciler,
    sandbox::SandboxStateCache,
    scheduler::ClaimWorker,
    state::AppState,
    store::{MemoryStore, ObjectStore},
};
use claimd_events::{EventRecorder, TracingRecorder};
use claimd_reconcile::{Clock, SystemClock};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to CLAIMD_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting claimd claim controller");
    info!(listen_addr = %config.listen_addr, workers = config.workers, "Configuration loaded");

    let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let recorder: Arc<dyn EventRecorder> = Arc::new(TracingRecorder);
    let cache = Arc::new(SandboxStateCache::new(clock.clone()));

    let control = ClaimControl::new(store.clone(), cache.clone(), recorder.clone(), clock)
        .with_poll_interval(config.claim_poll_interval);
    let reconciler = ClaimReconciler::new(store.clone(), control, recorder);
    let worker = Arc::new(ClaimWorker::new(
        store.clone(),
        reconciler,
        cache,
        config.worker_config(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    let app = api::create_router(AppState::new(store));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for workers to shut down...");
    if tokio::time::timeout(config.shutdown_timeout, worker_handle)
        .await
        .is_err()
    {
        warn!("Claim worker did not shut down in time");
    }

    info!("Claim controller shutdown complete");
    Ok(())
}
