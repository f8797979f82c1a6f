// src/connection/mod.rs

//! Manages the lifecycle of a single client WebSocket connection: the handshake, the
//! reader loop, the writer task, and cleanup of the registry entry.

mod guard;
mod handler;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
