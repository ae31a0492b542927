//! Uptime-check responder.
//!
//! Runs as its own task and shares nothing with the poll loop.

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use alphawatch_shared::{AlphaWatchError, Result};

/// Body returned by `GET /`.
pub const ALIVE_TEXT: &str = "AlphaWatch monitor is alive ✅";

pub fn router() -> Router {
    Router::new().route("/", get(alive))
}

async fn alive() -> &'static str {
    ALIVE_TEXT
}

/// Bind `address` (`host:port`).
pub async fn bind(address: &str) -> Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|e| AlphaWatchError::Network(format!("liveness bind {address}: {e}")))
}

/// Serve the responder until the listener fails.
pub async fn serve(listener: TcpListener) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "liveness endpoint listening");
    }
    axum::serve(listener, router())
        .await
        .map_err(|e| AlphaWatchError::Network(format!("liveness server: {e}")))
}
