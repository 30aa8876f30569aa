//! # conduit-server
//!
//! axum HTTP surface of the Conduit ingest pipeline: document upload, the
//! simulated CRM and risk-alert sinks, and audit queries over the event log.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

use conduit_core::ConduitConfig;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Run the service described by `cfg` until Ctrl-C.
pub async fn serve(cfg: &ConduitConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::init(cfg)?);
    let listener = TcpListener::bind(&cfg.server.bind).await?;

    tracing::info!(
        bind = %cfg.server.bind,
        base_url = %cfg.router.base_url,
        memory = ?cfg.memory.backend,
        max_upload_bytes = cfg.server.max_upload_bytes,
        "conduit-server listening"
    );

    run(listener, state, shutdown_signal()).await
}

/// Serve on `listener` until `shutdown` resolves, then drain and release
/// the router and the event log.
pub async fn run<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    state.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
