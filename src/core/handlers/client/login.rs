// src/core/handlers/client/login.rs

use super::payload_mismatch;
use crate::core::bus::USER_ACCESS_CONTROL_TOPIC;
use crate::core::connection::ConnectionState;
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::handlers::{ALREADY_IN_PROGRESS, reject};
use crate::core::protocol::messages::LoginRequest;
use crate::core::protocol::{Message, MessageHeader, Payload};
use tracing::{debug, error};

/// Forwards a login request to the user access control service.
#[derive(Debug, Clone)]
pub struct LoginHandler {
    server_id: u32,
}

impl LoginHandler {
    pub fn new(server_id: u32) -> Self {
        Self { server_id }
    }
}

impl MessageHandler for LoginHandler {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        let Some(connection) = ctx.connection() else {
            error!("Login received for a connection that is no longer registered.");
            return Ok(());
        };
        let Payload::Login(request) = &message.payload else {
            payload_mismatch("login", message, connection);
            return Ok(());
        };
        if connection.state() != ConnectionState::Unknown {
            reject(connection, ALREADY_IN_PROGRESS);
            return Ok(());
        }

        connection.username = request.username.clone();
        let outbound = Message::new(
            MessageHeader::for_client(connection.session_id(), self.server_id),
            Payload::Login(LoginRequest {
                username: request.username.clone(),
                password: request.password.clone(),
                ip: connection.address().host().to_string(),
            }),
        );
        debug!(
            "Session {}: forwarding login for '{}'.",
            connection.session_id(),
            request.username
        );
        ctx.publish(USER_ACCESS_CONTROL_TOPIC, outbound);
        Ok(())
    }
}
