// src/core/handlers/bus/login_response.rs

use super::{missing_session, payload_mismatch};
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::protocol::messages::LoginResponse;
use crate::core::protocol::{Message, Payload};
use tracing::info;

/// Applies the access control service's verdict on a login request.
///
/// A success reply for a session that is not `Unknown` (already logged in, or waiting
/// on a registration) fails with `InvalidTransition` and leaves the session untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginResponseHandler;

impl MessageHandler for LoginResponseHandler {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        let Payload::LoginResponse(response) = &message.payload else {
            payload_mismatch("login_response", message);
            return Ok(());
        };
        let Some(connection) = ctx.connection() else {
            missing_session(message);
            return Ok(());
        };

        match response.error_number {
            0 => {
                connection.complete_login(response.admin_status)?;
                info!(
                    "Session {}: '{}' logged in (admin status {}).",
                    connection.session_id(),
                    connection.username,
                    response.admin_status
                );
                connection.send(&Message::to_client(Payload::LoginResponse(
                    LoginResponse::success(response.admin_status),
                )));
            }
            LoginResponse::BANNED => {
                info!(
                    "Session {}: '{}' is banned, closing.",
                    connection.session_id(),
                    connection.username
                );
                connection.send(&Message::to_client(message.payload.clone()));
                connection.terminate();
            }
            _ => connection.send(&Message::to_client(message.payload.clone())),
        }
        Ok(())
    }
}
