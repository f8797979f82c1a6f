// src/core/errors.rs

//! Defines the primary error type for the gateway.

use std::sync::Arc;
use thiserror::Error;

use super::connection::ConnectionState;

/// The main error enum, representing all failures inside the gateway core.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// A payload or envelope could not be decoded. On the client side this ends the
    /// session; on the bus side the record is skipped.
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Connection already registered for address {0}")]
    AddressInUse(String),

    #[error("A handler is already registered for message type {0}")]
    DuplicateHandler(u32),

    #[error("Invalid connection state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("Internal Gateway Error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// True for errors caused by malformed input rather than by the gateway itself.
    pub fn is_serialization(&self) -> bool {
        matches!(self, GatewayError::Serialization(_))
    }
}

impl PartialEq for GatewayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (GatewayError::Io(e1), GatewayError::Io(e2)) => e1.kind() == e2.kind(),
            (GatewayError::Serialization(s1), GatewayError::Serialization(s2)) => s1 == s2,
            (GatewayError::WebSocket(s1), GatewayError::WebSocket(s2)) => s1 == s2,
            (GatewayError::Bus(s1), GatewayError::Bus(s2)) => s1 == s2,
            (GatewayError::AddressInUse(a1), GatewayError::AddressInUse(a2)) => a1 == a2,
            (GatewayError::DuplicateHandler(t1), GatewayError::DuplicateHandler(t2)) => t1 == t2,
            (
                GatewayError::InvalidTransition { from: f1, to: t1 },
                GatewayError::InvalidTransition { from: f2, to: t2 },
            ) => f1 == f2 && t1 == t2,
            (GatewayError::Internal(s1), GatewayError::Internal(s2)) => s1 == s2,
            _ => false,
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::Serialization(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        GatewayError::WebSocket(e.to_string())
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for GatewayError {
    fn from(e: rdkafka::error::KafkaError) -> Self {
        GatewayError::Bus(e.to_string())
    }
}
