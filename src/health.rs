use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tracing::info;

pub const ALIVE_BODY: &str = "🤖 Bot WhatsApp activo ✅";

/// Single-route router the hosting platform polls to keep the process up
pub fn router() -> Router {
    Router::new().route("/", get(alive))
}

async fn alive() -> &'static str {
    ALIVE_BODY
}

/// Serve the liveness endpoint on all interfaces until the process exits.
pub async fn serve(port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind liveness endpoint to {addr}"))?;

    info!("Liveness endpoint listening on port {}", port);

    axum::serve(listener, router())
        .await
        .context("Liveness server error")?;

    Ok(())
}
