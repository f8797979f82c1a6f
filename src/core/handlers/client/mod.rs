// src/core/handlers/client/mod.rs

//! Handlers for messages received from clients over the transport.

mod admin_quit;
mod chat_send;
mod login;
mod register;

pub use admin_quit::AdminQuitHandler;
pub use chat_send::ChatSendHandler;
pub use login::LoginHandler;
pub use register::RegisterHandler;

use super::{SOMETHING_WENT_WRONG, reject};
use crate::core::connection::Connection;
use crate::core::protocol::Message;
use tracing::error;

/// Handles a message whose payload does not match the type it was dispatched under.
pub(super) fn payload_mismatch(expected: &str, message: &Message, connection: &Connection) {
    error!(
        "Session {}: expected a {} payload, got {}.",
        connection.session_id(),
        expected,
        message.payload.name()
    );
    reject(connection, SOMETHING_WENT_WRONG);
}
