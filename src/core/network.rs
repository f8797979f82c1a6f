// src/core/network.rs

//! Client-side event handling, independent of the socket that produced the events.
//!
//! The connection tasks in `crate::connection` own the WebSocket and translate frames
//! into calls on [`ClientEvents`]. Everything that touches the registry, the client
//! dispatcher or the bus producer lives here.

use super::bus::{BusProducer, publish_all};
use super::connection::{Connection, ConnectionHandle, ConnectionKey};
use super::dispatcher::{DispatchOutcome, HandlerContext, MessageDispatcher};
use super::errors::GatewayError;
use super::metrics;
use super::protocol::codec;
use super::registry::Registry;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the connection task should do after a text frame has been processed.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The frame was dispatched; the session goes on.
    Dispatched(DispatchOutcome),
    /// The frame carried a message type the gateway does not know. It was dropped.
    Ignored,
    /// The session is over and the transport must be closed.
    Closed,
}

/// Shared state and behavior behind every client connection.
#[derive(Clone)]
pub struct ClientEvents {
    registry: Registry,
    dispatcher: Arc<MessageDispatcher>,
    producer: Arc<dyn BusProducer>,
}

impl ClientEvents {
    pub fn new(
        registry: Registry,
        dispatcher: Arc<MessageDispatcher>,
        producer: Arc<dyn BusProducer>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            producer,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers a newly opened transport. Returns the new session id.
    ///
    /// If the address is already registered the transport is terminated and an error is
    /// returned.
    pub fn on_connect(
        &self,
        key: ConnectionKey,
        handle: ConnectionHandle,
    ) -> Result<u64, GatewayError> {
        let connection = Connection::new(key.clone(), handle);
        let session_id = connection.session_id();
        self.registry.add(connection)?;
        info!("Client connected: {} (session {}).", key, session_id);
        Ok(session_id)
    }

    /// Decodes and dispatches one text frame from the client at `key`.
    pub fn on_text(&self, key: &ConnectionKey, text: &str) -> FrameOutcome {
        metrics::CLIENT_FRAMES_TOTAL.inc();
        let message = match codec::decode(text) {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("Ignoring frame of unknown type from {}.", key);
                return FrameOutcome::Ignored;
            }
            Err(e) => {
                warn!("Malformed frame from {}, closing the session: {}", key, e);
                metrics::DECODE_FAILURES_TOTAL
                    .with_label_values(&["client"])
                    .inc();
                if let Some(connection) = self.registry.remove(key) {
                    connection.terminate();
                }
                return FrameOutcome::Closed;
            }
        };

        let dispatched = self.registry.with(|connections| {
            connections.find_by_address(key)?;
            let mut ctx = HandlerContext::new(connections, Some(key.clone()));
            let outcome = self.dispatcher.dispatch(&message, &mut ctx);
            Some((outcome, ctx.into_publications()))
        });

        match dispatched {
            Some((outcome, publications)) => {
                publish_all(self.producer.as_ref(), publications);
                FrameOutcome::Dispatched(outcome)
            }
            None => {
                error!(
                    "No registered connection for {}, closing the transport.",
                    key
                );
                FrameOutcome::Closed
            }
        }
    }

    /// Echoes a binary frame back to its sender.
    pub fn on_binary(&self, handle: &ConnectionHandle, data: Bytes) {
        if !handle.send_binary(data) {
            debug!("Binary echo dropped, writer already closed.");
        }
    }

    /// Forgets session `session_id` at `key`. Safe to call more than once.
    ///
    /// The entry is only removed if it still belongs to `session_id`: a newer transport
    /// that reused the address is left alone.
    pub fn on_disconnect(&self, key: &ConnectionKey, session_id: u64) -> Option<Connection> {
        let removed = self.registry.with(|connections| {
            let owner = connections.find_by_address(key).map(|c| c.session_id());
            match owner {
                Some(id) if id == session_id => connections.remove(key),
                Some(id) => {
                    debug!(
                        "Address {} now belongs to session {}, not removing it for session {}.",
                        key, id, session_id
                    );
                    None
                }
                None => None,
            }
        });
        if let Some(connection) = &removed {
            info!(
                "Client disconnected: {} (session {}, connected for {:?}).",
                key,
                connection.session_id(),
                connection.connected_at().elapsed()
            );
        }
        removed
    }
}
