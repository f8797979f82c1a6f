// src/core/bus_loop.rs

//! The loop that consumes bus records and dispatches them to local sessions.
//!
//! It runs on a blocking thread because both bus clients are driven by synchronous,
//! bounded polls. Shutdown is observed once per iteration, so the loop stops within one
//! poll timeout of the token being cancelled.

use super::bus::{BusConsumer, BusProducer, publish_all};
use super::dispatcher::{DispatchOutcome, HandlerContext, MessageDispatcher};
use super::metrics;
use super::protocol::Message;
use super::registry::Registry;
use super::shutdown::ShutdownContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default time a single consumer poll may wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// What one iteration of the bus loop did.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Nothing was received, or the record had an unknown type.
    Idle,
    /// The record was addressed elsewhere or its session is not connected here.
    Dropped,
    /// The record could not be decoded or the consumer failed. The loop carries on.
    Failed,
    Dispatched(DispatchOutcome),
}

pub struct BusLoop {
    server_id: u32,
    registry: Registry,
    dispatcher: MessageDispatcher,
    producer: Arc<dyn BusProducer>,
    consumer: Box<dyn BusConsumer>,
    shutdown: ShutdownContext,
    poll_timeout: Duration,
}

impl BusLoop {
    pub fn new(
        server_id: u32,
        registry: Registry,
        dispatcher: MessageDispatcher,
        producer: Arc<dyn BusProducer>,
        consumer: Box<dyn BusConsumer>,
        shutdown: ShutdownContext,
    ) -> Self {
        Self {
            server_id,
            registry,
            dispatcher,
            producer,
            consumer,
            shutdown,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Runs until shutdown is requested, then hands the consumer back so the caller can
    /// close it.
    pub fn run(mut self) -> Box<dyn BusConsumer> {
        info!(
            "Bus loop started for server {} (poll timeout {:?}).",
            self.server_id, self.poll_timeout
        );
        while !self.shutdown.is_triggered() {
            self.run_once();
        }
        info!("Bus loop stopped.");
        self.consumer
    }

    /// Drives producer delivery reports, then receives and handles at most one record.
    pub fn run_once(&mut self) -> RecordOutcome {
        self.producer.poll(Duration::ZERO);
        match self.consumer.try_get_message(self.poll_timeout) {
            Ok(None) => RecordOutcome::Idle,
            Ok(Some(message)) => {
                metrics::BUS_RECORDS_TOTAL.inc();
                self.handle_record(message)
            }
            Err(e) if e.is_serialization() => {
                warn!("Skipping malformed bus record: {}", e);
                metrics::DECODE_FAILURES_TOTAL
                    .with_label_values(&["bus"])
                    .inc();
                RecordOutcome::Failed
            }
            Err(e) => {
                error!("Bus consumer error: {}", e);
                RecordOutcome::Failed
            }
        }
    }

    fn handle_record(&self, message: Message) -> RecordOutcome {
        if !message.header.is_addressed_to(self.server_id) {
            debug!(
                "Dropping {} addressed to server {}.",
                message.payload.name(),
                message.header.server_destination_id
            );
            return RecordOutcome::Dropped;
        }

        let dispatched = self.registry.with(|connections| {
            let key = if message.payload.requires_session() {
                Some(connections.key_of_session(message.header.client_id)?.clone())
            } else {
                None
            };
            let mut ctx = HandlerContext::new(connections, key);
            let outcome = self.dispatcher.dispatch(&message, &mut ctx);
            Some((outcome, ctx.into_publications()))
        });

        match dispatched {
            Some((outcome, publications)) => {
                publish_all(self.producer.as_ref(), publications);
                RecordOutcome::Dispatched(outcome)
            }
            None => {
                debug!(
                    "Dropping {}: session {} is not connected here.",
                    message.payload.name(),
                    message.header.client_id
                );
                RecordOutcome::Dropped
            }
        }
    }
}
