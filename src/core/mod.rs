// src/core/mod.rs

//! The central module containing the core logic and data structures of the gateway.

pub mod bus;
pub mod bus_loop;
pub mod connection;
pub mod dispatcher;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod network;
pub mod protocol;
pub mod registry;
pub mod shutdown;

pub use errors::GatewayError;
pub use protocol::{Message, MessageHeader, Payload};
pub use registry::Registry;
