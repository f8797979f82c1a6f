// src/core/handlers/bus/send_map.rs

use super::{missing_session, payload_mismatch};
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::protocol::{Message, Payload};

/// Forwards map data from the game services to the client it was produced for.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendMapHandler;

impl MessageHandler for SendMapHandler {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        if !matches!(message.payload, Payload::SendMap(_)) {
            payload_mismatch("send_map", message);
            return Ok(());
        }
        match ctx.connection() {
            Some(connection) => connection.send(&Message::to_client(message.payload.clone())),
            None => missing_session(message),
        }
        Ok(())
    }
}
