// src/core/handlers/bus/register_response.rs

use super::{missing_session, payload_mismatch};
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::protocol::messages::RegisterResponse;
use crate::core::protocol::{Message, Payload};
use tracing::info;

/// Applies the result of a registration. A successful registration also logs the
/// session in, as a regular user.
///
/// A failed registration leaves the session in `Registering`; the client has to
/// reconnect to try again.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterResponseHandler;

impl MessageHandler for RegisterResponseHandler {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        let Payload::RegisterResponse(response) = &message.payload else {
            payload_mismatch("register_response", message);
            return Ok(());
        };
        let Some(connection) = ctx.connection() else {
            missing_session(message);
            return Ok(());
        };

        if response.error_number != 0 {
            connection.send(&Message::to_client(message.payload.clone()));
            return Ok(());
        }

        connection.complete_registration()?;
        info!(
            "Session {}: '{}' registered.",
            connection.session_id(),
            connection.username
        );
        connection.send(&Message::to_client(Payload::RegisterResponse(
            RegisterResponse::success(),
        )));
        Ok(())
    }
}
