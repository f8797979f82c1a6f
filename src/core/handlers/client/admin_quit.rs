// src/core/handlers/client/admin_quit.rs

use super::payload_mismatch;
use crate::core::bus::BROADCAST_TOPIC;
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::handlers::{NEED_LOGIN, NOT_AN_ADMIN, reject};
use crate::core::protocol::messages::AdminQuit;
use crate::core::protocol::{Message, MessageHeader, Payload};
use tracing::{error, warn};

/// Broadcasts a quit order to every gateway. Only admins may send it.
#[derive(Debug, Clone)]
pub struct AdminQuitHandler {
    server_id: u32,
}

impl AdminQuitHandler {
    pub fn new(server_id: u32) -> Self {
        Self { server_id }
    }
}

impl MessageHandler for AdminQuitHandler {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        let Some(connection) = ctx.connection() else {
            error!("Admin quit received for a connection that is no longer registered.");
            return Ok(());
        };
        if !matches!(message.payload, Payload::AdminQuit(_)) {
            payload_mismatch("admin_quit", message, connection);
            return Ok(());
        }
        if !connection.is_logged_in() {
            reject(connection, NEED_LOGIN);
            return Ok(());
        }
        if connection.admin_status() <= 0 {
            reject(connection, NOT_AN_ADMIN);
            return Ok(());
        }

        warn!(
            "Admin '{}' (session {}) requested a shutdown of all gateways.",
            connection.username,
            connection.session_id()
        );
        let outbound = Message::new(
            MessageHeader::for_client(connection.session_id(), self.server_id),
            Payload::AdminQuit(AdminQuit::default()),
        );
        ctx.publish(BROADCAST_TOPIC, outbound);
        Ok(())
    }
}
