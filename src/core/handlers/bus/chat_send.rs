// src/core/handlers/bus/chat_send.rs

use super::payload_mismatch;
use crate::core::connection::Connection;
use crate::core::dispatcher::{HandlerContext, MessageHandler};
use crate::core::errors::GatewayError;
use crate::core::protocol::messages::{CHAT_TARGET_ALL, ChatReceive};
use crate::core::protocol::{Message, Payload};
use tracing::debug;

/// Delivers a chat message to the local clients it targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatSendHandler;

impl MessageHandler for ChatSendHandler {
    fn handle(&self, message: &Message, ctx: &mut HandlerContext<'_>) -> Result<(), GatewayError> {
        let Payload::ChatSend(chat) = &message.payload else {
            payload_mismatch("chat_send", message);
            return Ok(());
        };

        let delivery = Message::to_client(Payload::ChatReceive(ChatReceive {
            from_username: chat.from_username.clone(),
            target: chat.target.clone(),
            message: chat.message.clone(),
        }));
        let mut delivered = 0usize;
        let mut deliver = |c: &Connection| {
            c.send(&delivery);
            delivered += 1;
        };
        if chat.target == CHAT_TARGET_ALL {
            ctx.connections().for_each_logged_in(&mut deliver);
        } else {
            ctx.connections()
                .for_each_logged_in_named(&chat.target, &mut deliver);
        }
        debug!(
            "Chat from '{}' to '{}' delivered to {} local connection(s).",
            chat.from_username, chat.target, delivered
        );
        Ok(())
    }
}
