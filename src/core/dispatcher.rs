// src/core/dispatcher.rs

//! The message dispatch table.
//!
//! A `MessageDispatcher` maps a message type id to exactly one handler. The gateway runs
//! two independent dispatchers: one for messages coming from clients and one for messages
//! coming from the bus. The dispatcher does no business logic; it looks up and invokes.

use super::connection::{Connection, ConnectionKey};
use super::errors::GatewayError;
use super::metrics;
use super::protocol::Message;
use super::registry::Connections;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error};

/// Which side of the gateway a dispatcher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Client,
    Bus,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Client => "client",
            Direction::Bus => "bus",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message a handler wants published on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub topic: String,
    pub message: Message,
}

/// Everything a handler may touch while it runs.
///
/// A context is built inside the registry's critical section. It gives the handler the
/// connection the message belongs to (if any) and read access to the other connections.
/// Bus publications are only collected here; the loop sends them once the lock is released.
pub struct HandlerContext<'a> {
    connections: &'a mut Connections,
    connection: Option<ConnectionKey>,
    publications: Vec<Publication>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(connections: &'a mut Connections, connection: Option<ConnectionKey>) -> Self {
        Self {
            connections,
            connection,
            publications: Vec::new(),
        }
    }

    /// The connection the message is associated with, if it is still registered.
    pub fn connection(&mut self) -> Option<&mut Connection> {
        match &self.connection {
            Some(key) => self.connections.find_by_address_mut(key),
            None => None,
        }
    }

    /// All registered connections, for handlers that fan out.
    pub fn connections(&self) -> &Connections {
        self.connections
    }

    /// Queues `message` for publication on `topic`.
    pub fn publish(&mut self, topic: impl Into<String>, message: Message) {
        self.publications.push(Publication {
            topic: topic.into(),
            message,
        });
    }

    /// Consumes the context, returning the queued publications.
    pub fn into_publications(self) -> Vec<Publication> {
        self.publications
    }
}

/// Business logic invoked by a dispatcher for one message type.
///
/// Handlers run synchronously on the loop that received the message, with the registry
/// locked. They must not block.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError>;
}

/// What happened to a dispatched message.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The registered handler ran and succeeded.
    Handled,
    /// No handler is registered for the message's type; the message was dropped.
    Unregistered(u32),
    /// The handler ran and returned an error. The loop carries on.
    Failed(GatewayError),
}

/// A routing table from message type id to handler.
pub struct MessageDispatcher {
    direction: Direction,
    handlers: HashMap<u32, Box<dyn MessageHandler>>,
}

impl MessageDispatcher {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            handlers: HashMap::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Registers `handler` for `message_type`. Registering the same type twice is a
    /// configuration error.
    pub fn register<H>(&mut self, message_type: u32, handler: H) -> Result<(), GatewayError>
    where
        H: MessageHandler + 'static,
    {
        if self.handlers.contains_key(&message_type) {
            return Err(GatewayError::DuplicateHandler(message_type));
        }
        self.handlers.insert(message_type, Box::new(handler));
        debug!(
            "Registered {} handler for message type {}.",
            self.direction, message_type
        );
        Ok(())
    }

    pub fn is_registered(&self, message_type: u32) -> bool {
        self.handlers.contains_key(&message_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invokes the handler registered for the message's type.
    pub fn dispatch(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> DispatchOutcome {
        let message_type = message.message_type();
        let Some(handler) = self.handlers.get(&message_type) else {
            debug!(
                "No {} handler for message type {} ({}), dropping.",
                self.direction,
                message_type,
                message.payload.name()
            );
            metrics::UNHANDLED_MESSAGES_TOTAL
                .with_label_values(&[self.direction.as_str()])
                .inc();
            return DispatchOutcome::Unregistered(message_type);
        };

        match handler.handle(message, ctx) {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                error!(
                    "{} handler for {} failed: {}",
                    self.direction,
                    message.payload.name(),
                    e
                );
                metrics::HANDLER_FAILURES_TOTAL
                    .with_label_values(&[self.direction.as_str()])
                    .inc();
                DispatchOutcome::Failed(e)
            }
        }
    }
}

impl fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("MessageDispatcher")
            .field("direction", &self.direction)
            .field("message_types", &types)
            .finish()
    }
}
