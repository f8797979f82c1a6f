// src/server/spawner.rs

//! Spawns the gateway's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::bus::BusConsumer;
use anyhow::{Result, anyhow};
use tokio::task::JoinHandle;
use tracing::info;

/// Starts the bus loop on a blocking thread and any optional background tasks.
///
/// Returns the bus loop's handle; it resolves to the consumer once the loop has stopped.
pub fn spawn_all(ctx: &mut ServerContext) -> Result<JoinHandle<Box<dyn BusConsumer>>> {
    // --- Metrics Server ---
    if ctx.config.metrics.enabled {
        let port = ctx.config.metrics.port;
        let registry = ctx.registry.clone();
        let shutdown = ctx.shutdown.clone();
        ctx.background_tasks.spawn(async move {
            metrics_server::run_metrics_server(port, registry, shutdown).await
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // --- Bus Loop ---
    let bus_loop = ctx
        .bus_loop
        .take()
        .ok_or_else(|| anyhow!("bus loop already started"))?;
    Ok(tokio::task::spawn_blocking(move || bus_loop.run()))
}
