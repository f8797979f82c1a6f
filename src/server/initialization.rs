// src/server/initialization.rs

//! Builds every gateway component from the configuration before any loop starts.

use super::context::ServerContext;
use crate::config::{BusBackend, Config};
use crate::core::bus::memory::MemoryBus;
use crate::core::bus::{BusConsumer, BusProducer, inbound_topics};
use crate::core::bus_loop::BusLoop;
use crate::core::handlers;
use crate::core::network::ClientEvents;
use crate::core::registry::Registry;
use crate::core::shutdown::ShutdownContext;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all gateway components before starting the loops.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let shutdown = ShutdownContext::new();
    let registry = Registry::new();

    let (producer, consumer) = connect_bus(&config)?;

    let client_dispatcher = handlers::client_dispatcher(config.server_id)
        .context("Failed to build the client dispatcher")?;
    let bus_dispatcher = handlers::bus_dispatcher(shutdown.clone())
        .context("Failed to build the bus dispatcher")?;

    let events = ClientEvents::new(
        registry.clone(),
        Arc::new(client_dispatcher),
        producer.clone(),
    );
    let bus_loop = BusLoop::new(
        config.server_id,
        registry.clone(),
        bus_dispatcher,
        producer.clone(),
        consumer,
        shutdown.clone(),
    )
    .with_poll_timeout(config.bus.poll_timeout());

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;
    info!("realmgate listening on {}", config.listen_addr());
    let connection_permits = Arc::new(Semaphore::new(config.max_clients));

    Ok(ServerContext {
        config,
        shutdown,
        registry,
        events,
        producer,
        bus_loop: Some(bus_loop),
        listener,
        connection_permits,
        background_tasks: JoinSet::new(),
    })
}

fn log_startup_info(config: &Config) {
    info!(
        "Gateway server id {} (group '{}'), up to {} clients.",
        config.server_id, config.group_id, config.max_clients
    );
    info!(
        "Consuming topics {:?} via the {:?} bus backend.",
        inbound_topics(config.server_id),
        config.bus.backend
    );
    if config.bus.backend == BusBackend::Memory {
        warn!("WARNING: Using the in-process bus. No other service will see this gateway's traffic.");
    }
}

/// Creates the producer and the subscribed consumer for the configured backend.
fn connect_bus(config: &Config) -> Result<(Arc<dyn BusProducer>, Box<dyn BusConsumer>)> {
    let topics = inbound_topics(config.server_id);
    match config.bus.backend {
        BusBackend::Memory => {
            let bus = MemoryBus::new();
            Ok((Arc::new(bus.producer()), Box::new(bus.consumer(&topics))))
        }
        #[cfg(feature = "kafka")]
        BusBackend::Kafka => {
            use crate::core::bus::kafka::{KafkaConsumer, KafkaProducer};
            let producer = KafkaProducer::start(&config.broker_list)
                .context("Failed to start the Kafka producer")?;
            let consumer = KafkaConsumer::start(&config.broker_list, &config.group_id, &topics)
                .context("Failed to start the Kafka consumer")?;
            Ok((Arc::new(producer), Box::new(consumer)))
        }
        #[cfg(not(feature = "kafka"))]
        BusBackend::Kafka => Err(anyhow::anyhow!(
            "the Kafka bus backend requires building with the 'kafka' feature"
        )),
    }
}
