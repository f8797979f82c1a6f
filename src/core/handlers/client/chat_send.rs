// src/core/handlers/client/chat_send.rs

use super::payload_mismatch;
use crate::core::bus::CHAT_TOPIC;
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::handlers::{NEED_LOGIN, reject};
use crate::core::protocol::messages::ChatSend;
use crate::core::protocol::{Message, MessageHeader, Payload};
use tracing::error;

/// Publishes a chat message on behalf of a logged-in client.
///
/// The sender name is always taken from the session, never from the client's payload.
#[derive(Debug, Clone)]
pub struct ChatSendHandler {
    server_id: u32,
}

impl ChatSendHandler {
    pub fn new(server_id: u32) -> Self {
        Self { server_id }
    }
}

impl MessageHandler for ChatSendHandler {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        let Some(connection) = ctx.connection() else {
            error!("Chat received for a connection that is no longer registered.");
            return Ok(());
        };
        let Payload::ChatSend(chat) = &message.payload else {
            payload_mismatch("chat_send", message, connection);
            return Ok(());
        };
        if !connection.is_logged_in() {
            reject(connection, NEED_LOGIN);
            return Ok(());
        }

        let outbound = Message::new(
            MessageHeader::for_client(connection.session_id(), self.server_id),
            Payload::ChatSend(ChatSend {
                from_username: connection.username.clone(),
                target: chat.target.clone(),
                message: chat.message.clone(),
            }),
        );
        ctx.publish(CHAT_TOPIC, outbound);
        Ok(())
    }
}
