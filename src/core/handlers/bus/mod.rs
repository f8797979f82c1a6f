// src/core/handlers/bus/mod.rs

//! Handlers for records received from the message bus.
//!
//! Replies (`LoginResponse`, `RegisterResponse`, `SendMap`) are only dispatched when the
//! session they answer is connected here. Fan-out messages arrive without a connection.

mod chat_send;
mod login_response;
mod quit;
mod register_response;
mod send_map;

pub use chat_send::ChatSendHandler;
pub use login_response::LoginResponseHandler;
pub use quit::QuitHandler;
pub use register_response::RegisterResponseHandler;
pub use send_map::SendMapHandler;

use crate::core::protocol::Message;
use tracing::{debug, error};

fn missing_session(message: &Message) {
    debug!(
        "Dropping {} for session {}: not connected here.",
        message.payload.name(),
        message.header.client_id
    );
}

fn payload_mismatch(expected: &str, message: &Message) {
    error!(
        "Expected a {} payload from the bus, got {}.",
        expected,
        message.payload.name()
    );
}
