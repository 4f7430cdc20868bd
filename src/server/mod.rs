//! HTTP boundary: `/scrape`, `/aggregate` and `/health`.

pub mod app;
pub mod routes;

pub use app::{build_app, AppState};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

/// Serve until Ctrl-C, then cancel whatever is still in flight
pub async fn serve(bind_address: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested, cancelling in-flight scrapes");
            shutdown.cancel();
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
