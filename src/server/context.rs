// src/server/context.rs

use crate::config::Config;
use crate::core::bus::BusProducer;
use crate::core::bus_loop::BusLoop;
use crate::core::network::ClientEvents;
use crate::core::registry::Registry;
use crate::core::shutdown::ShutdownContext;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the gateway's loops.
pub struct ServerContext {
    pub config: Config,
    pub shutdown: ShutdownContext,
    pub registry: Registry,
    pub events: ClientEvents,
    pub producer: Arc<dyn BusProducer>,
    /// Taken by the spawner when the bus loop is started.
    pub bus_loop: Option<BusLoop>,
    pub listener: TcpListener,
    pub connection_permits: Arc<Semaphore>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
}
