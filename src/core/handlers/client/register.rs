// src/core/handlers/client/register.rs

use super::payload_mismatch;
use crate::core::bus::USER_ACCESS_CONTROL_TOPIC;
use crate::core::connection::ConnectionState;
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::handlers::{ALREADY_IN_PROGRESS, reject};
use crate::core::protocol::messages::RegisterRequest;
use crate::core::protocol::{Message, MessageHeader, Payload};
use tracing::{debug, error};

/// Forwards a registration request and moves the session to `Registering`.
#[derive(Debug, Clone)]
pub struct RegisterHandler {
    server_id: u32,
}

impl RegisterHandler {
    pub fn new(server_id: u32) -> Self {
        Self { server_id }
    }
}

impl MessageHandler for RegisterHandler {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        let Some(connection) = ctx.connection() else {
            error!("Register received for a connection that is no longer registered.");
            return Ok(());
        };
        let Payload::Register(request) = &message.payload else {
            payload_mismatch("register", message, connection);
            return Ok(());
        };
        if connection.state() != ConnectionState::Unknown {
            reject(connection, ALREADY_IN_PROGRESS);
            return Ok(());
        }

        connection.begin_registration()?;
        connection.username = request.username.clone();
        let outbound = Message::new(
            MessageHeader::for_client(connection.session_id(), self.server_id),
            Payload::Register(RegisterRequest {
                username: request.username.clone(),
                password: request.password.clone(),
                email: request.email.clone(),
                ip: connection.address().host().to_string(),
            }),
        );
        debug!(
            "Session {}: forwarding registration for '{}'.",
            connection.session_id(),
            request.username
        );
        ctx.publish(USER_ACCESS_CONTROL_TOPIC, outbound);
        Ok(())
    }
}
