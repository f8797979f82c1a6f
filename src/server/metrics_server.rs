// src/server/metrics_server.rs

use crate::core::metrics::{self, gather_metrics};
use crate::core::registry::Registry;
use crate::core::shutdown::ShutdownContext;
use anyhow::{Context, Result};
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use tracing::info;

/// Handles HTTP requests to the /metrics endpoint.
///
/// Session gauges are refreshed from the registry before gathering.
async fn metrics_handler(registry: Registry) -> impl IntoResponse {
    let (connected, logged_in) = registry.with(|c| (c.len(), c.logged_in_count()));
    metrics::CONNECTED_CLIENTS.set(connected as f64);
    metrics::LOGGED_IN_CLIENTS.set(logged_in as f64);

    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Runs a simple HTTP server to expose Prometheus metrics on /metrics.
pub async fn run_metrics_server(
    port: u16,
    registry: Registry,
    shutdown: ShutdownContext,
) -> Result<()> {
    let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on port {port}"))?;
    info!(
        "Prometheus metrics server listening on http://{}/metrics",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.triggered().await;
            info!("Metrics server shutting down.");
        })
        .await
        .context("Metrics server failed")
}
