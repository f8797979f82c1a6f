// src/core/bus/mod.rs

//! The gateway's contract with the message bus, plus its backends.
//!
//! The bus loop drives both halves synchronously with bounded timeouts, which matches how
//! poll-based Kafka clients are used.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

use super::dispatcher::Publication;
use super::errors::GatewayError;
use super::protocol::Message;
use std::time::Duration;
use tracing::error;

/// Outbound topic for login and registration requests.
pub const USER_ACCESS_CONTROL_TOPIC: &str = "user_access_control_messages";
/// Outbound topic for chat messages.
pub const CHAT_TOPIC: &str = "chat_messages";
/// Topic every gateway subscribes to.
pub const BROADCAST_TOPIC: &str = "broadcast";

/// The per-gateway inbound topic.
pub fn server_topic(server_id: u32) -> String {
    format!("server-{server_id}")
}

/// The topics a gateway with `server_id` consumes.
pub fn inbound_topics(server_id: u32) -> Vec<String> {
    vec![server_topic(server_id), BROADCAST_TOPIC.to_string()]
}

/// Publishes messages to the bus.
pub trait BusProducer: Send + Sync {
    /// Queues `message` for delivery on `topic`. Never waits for the broker.
    fn enqueue(&self, topic: &str, message: &Message) -> Result<(), GatewayError>;

    /// Drives delivery reports for queued messages, waiting at most `timeout`.
    fn poll(&self, timeout: Duration);

    /// Flushes what it can and releases the client.
    fn close(&self);
}

/// Receives messages addressed to this gateway.
pub trait BusConsumer: Send {
    /// Waits at most `timeout` for one record.
    ///
    /// Returns `Ok(None)` if nothing arrived or the record's type is unknown, and
    /// [`GatewayError::Serialization`] if a record could not be decoded.
    fn try_get_message(&mut self, timeout: Duration) -> Result<Option<Message>, GatewayError>;

    fn close(&mut self);
}

/// Sends the publications collected by a handler. Failures are logged, not returned,
/// because the client request that caused them has already been accepted.
pub fn publish_all(producer: &dyn BusProducer, publications: Vec<Publication>) {
    for publication in publications {
        if let Err(e) = producer.enqueue(&publication.topic, &publication.message) {
            error!(
                "Failed to enqueue {} on topic '{}': {}",
                publication.message.payload.name(),
                publication.topic,
                e
            );
        }
    }
}
