// src/server/shutdown.rs

//! Stops the gateway's loops in order once shutdown has been requested.

use crate::core::bus::{BusConsumer, BusProducer};
use crate::core::shutdown::ShutdownContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// How the transport loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The transport loop finished within the grace period.
    Joined,
    /// The grace period ran out; the transport loop was left running.
    Detached,
}

pub struct ShutdownOrchestrator {
    shutdown: ShutdownContext,
    producer: Arc<dyn BusProducer>,
    grace: Duration,
}

impl ShutdownOrchestrator {
    pub fn new(shutdown: ShutdownContext, producer: Arc<dyn BusProducer>, grace: Duration) -> Self {
        Self {
            shutdown,
            producer,
            grace,
        }
    }

    /// Triggers shutdown, waits for the bus loop, then winds down the rest.
    pub async fn run(
        self,
        bus_loop: JoinHandle<Box<dyn BusConsumer>>,
        transport: JoinHandle<()>,
    ) -> ShutdownOutcome {
        self.shutdown.trigger("shutdown sequence started");
        let bus_result = bus_loop.await;
        self.finish(bus_result, transport).await
    }

    /// Continues the sequence once the bus loop has already ended.
    ///
    /// The bus loop stopped first, so no bus work is in flight. The consumer and the
    /// producer are closed, then the transport loop gets the grace period to finish.
    pub async fn finish(
        self,
        bus_result: Result<Box<dyn BusConsumer>, JoinError>,
        transport: JoinHandle<()>,
    ) -> ShutdownOutcome {
        self.shutdown.trigger("shutdown sequence started");

        match bus_result {
            Ok(mut consumer) => {
                consumer.close();
                info!("Bus consumer closed.");
            }
            Err(e) => error!("CRITICAL: Bus loop ended abnormally: {e:?}"),
        }
        self.producer.close();
        info!("Bus producer flushed and closed.");

        match tokio::time::timeout(self.grace, transport).await {
            Ok(Ok(())) => {
                info!("Network loop stopped.");
                ShutdownOutcome::Joined
            }
            Ok(Err(e)) => {
                error!("Network loop ended abnormally: {e:?}");
                ShutdownOutcome::Joined
            }
            Err(_) => {
                warn!(
                    "Network loop did not stop within {:?}, detaching it.",
                    self.grace
                );
                ShutdownOutcome::Detached
            }
        }
    }
}
