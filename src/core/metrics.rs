// src/core/metrics.rs

//! Defines and registers Prometheus metrics for gateway monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    // --- Gauges ---
    /// The number of clients currently present in the connection registry.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("realmgate_connected_clients", "Number of currently registered client connections.").unwrap();
    /// The number of registered clients that completed login or registration.
    pub static ref LOGGED_IN_CLIENTS: Gauge =
        register_gauge!("realmgate_logged_in_clients", "Number of logged-in client connections.").unwrap();

    // --- Counters ---
    /// The total number of WebSocket connections accepted since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("realmgate_connections_received_total", "Total number of connections received.").unwrap();
    /// Connections closed at accept or registration time (client limit, duplicate address).
    pub static ref REJECTED_CONNECTIONS_TOTAL: Counter =
        register_counter!("realmgate_rejected_connections_total", "Total number of connections rejected.").unwrap();
    /// Text frames received from clients.
    pub static ref CLIENT_FRAMES_TOTAL: Counter =
        register_counter!("realmgate_client_frames_total", "Total number of text frames received from clients.").unwrap();
    /// Records received from the message bus.
    pub static ref BUS_RECORDS_TOTAL: Counter =
        register_counter!("realmgate_bus_records_total", "Total number of records received from the bus.").unwrap();
    /// Frames or records that failed to decode, labeled by direction.
    pub static ref DECODE_FAILURES_TOTAL: CounterVec =
        register_counter_vec!("realmgate_decode_failures_total", "Total number of undecodable messages, labeled by direction.", &["direction"]).unwrap();
    /// Messages dropped because no handler is registered for their type, labeled by direction.
    pub static ref UNHANDLED_MESSAGES_TOTAL: CounterVec =
        register_counter_vec!("realmgate_unhandled_messages_total", "Total number of messages without a registered handler, labeled by direction.", &["direction"]).unwrap();
    /// Handler invocations that returned an error, labeled by direction.
    pub static ref HANDLER_FAILURES_TOTAL: CounterVec =
        register_counter_vec!("realmgate_handler_failures_total", "Total number of failed handler invocations, labeled by direction.", &["direction"]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
