// src/server/mod.rs

use crate::config::Config;
use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

mod context;
mod initialization;
mod metrics_server;
pub mod network_loop;
pub mod shutdown;
mod spawner;

pub use network_loop::NetworkLoop;
pub use shutdown::{ShutdownOrchestrator, ShutdownOutcome};

/// The main gateway startup function, orchestrating all setup phases and the shutdown
/// sequence.
pub async fn run(config: Config) -> Result<ShutdownOutcome> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;

    // 1. Build every component and bind the listener.
    let mut ctx = initialization::setup(config).await?;

    // 2. Start the bus loop and background tasks.
    let mut bus_task = spawner::spawn_all(&mut ctx)?;

    // 3. Start accepting clients.
    let network = NetworkLoop::new(
        ctx.listener,
        ctx.events,
        ctx.connection_permits,
        ctx.shutdown.clone(),
    );
    let transport = tokio::spawn(network.run());

    let shutdown = ctx.shutdown.clone();
    let orchestrator =
        ShutdownOrchestrator::new(shutdown.clone(), ctx.producer, ctx.config.shutdown_grace());
    let mut background_tasks = ctx.background_tasks;

    let bus_exit = loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break None;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break None;
            }
            _ = shutdown.triggered() => break None,
            res = &mut bus_task => {
                error!("CRITICAL: Bus loop stopped while the gateway was running. Shutting down.");
                break Some(res);
            }
            Some(res) = background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break None; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break None; }
                }
            }
        }
    };

    let outcome = match bus_exit {
        Some(res) => orchestrator.finish(res, transport).await,
        None => orchestrator.run(bus_task, transport).await,
    };

    if tokio::time::timeout(Duration::from_secs(2), async {
        while background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    }
    info!("Gateway shutdown complete ({:?}).", outcome);
    Ok(outcome)
}
