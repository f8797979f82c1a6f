// src/core/handlers/bus/quit.rs

use super::payload_mismatch;
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::protocol::{Message, Payload};
use crate::core::shutdown::ShutdownContext;
use tracing::warn;

/// Stops the gateway when an admin quit order arrives on the bus.
#[derive(Debug, Clone)]
pub struct QuitHandler {
    shutdown: ShutdownContext,
}

impl QuitHandler {
    pub fn new(shutdown: ShutdownContext) -> Self {
        Self { shutdown }
    }
}

impl MessageHandler for QuitHandler {
    fn handle(&self, message: &Message, _ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        if !matches!(message.payload, Payload::AdminQuit(_)) {
            payload_mismatch("admin_quit", message);
            return Ok(());
        }
        warn!(
            "Quit order received from server {} (session {}).",
            message.header.server_origin_id, message.header.client_id
        );
        self.shutdown.trigger("admin quit received from the bus");
        Ok(())
    }
}
