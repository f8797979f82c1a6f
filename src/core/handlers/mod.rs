// src/core/handlers/mod.rs

//! The gateway's message handlers and the two dispatch tables built from them.
//!
//! Client handlers validate the session state and turn client requests into bus
//! publications. Bus handlers apply backend replies to sessions and forward them to
//! clients. Every rejection is answered with an explicit response; nothing is dropped
//! silently.

pub mod bus;
pub mod client;

use super::connection::Connection;
use super::dispatcher::{Direction, MessageDispatcher};
use super::errors::GatewayError;
use super::protocol::messages::*;
use super::protocol::{Message, Payload};
use super::shutdown::ShutdownContext;

pub(crate) const NEED_LOGIN: &str = "Need to login.";
pub(crate) const ALREADY_IN_PROGRESS: &str =
    "Already logged in or awaiting response on register request.";
pub(crate) const SOMETHING_WENT_WRONG: &str = "Something went wrong.";
pub(crate) const NOT_AN_ADMIN: &str = "Not allowed.";

/// Sends a gateway-generated rejection to `connection`.
pub(crate) fn reject(connection: &Connection, reason: &str) {
    connection.send(&Message::to_client(Payload::LoginResponse(
        LoginResponse::rejected(reason),
    )));
}

/// Builds the dispatcher for messages received from clients.
pub fn client_dispatcher(server_id: u32) -> Result<MessageDispatcher, GatewayError> {
    let mut dispatcher = MessageDispatcher::new(Direction::Client);
    dispatcher.register(LOGIN_MESSAGE_TYPE, client::LoginHandler::new(server_id))?;
    dispatcher.register(REGISTER_MESSAGE_TYPE, client::RegisterHandler::new(server_id))?;
    dispatcher.register(CHAT_SEND_MESSAGE_TYPE, client::ChatSendHandler::new(server_id))?;
    dispatcher.register(
        ADMIN_QUIT_MESSAGE_TYPE,
        client::AdminQuitHandler::new(server_id),
    )?;
    Ok(dispatcher)
}

/// Builds the dispatcher for messages received from the bus.
pub fn bus_dispatcher(shutdown: ShutdownContext) -> Result<MessageDispatcher, GatewayError> {
    let mut dispatcher = MessageDispatcher::new(Direction::Bus);
    dispatcher.register(LOGIN_RESPONSE_MESSAGE_TYPE, bus::LoginResponseHandler)?;
    dispatcher.register(REGISTER_RESPONSE_MESSAGE_TYPE, bus::RegisterResponseHandler)?;
    dispatcher.register(CHAT_SEND_MESSAGE_TYPE, bus::ChatSendHandler)?;
    dispatcher.register(SEND_MAP_MESSAGE_TYPE, bus::SendMapHandler)?;
    dispatcher.register(ADMIN_QUIT_MESSAGE_TYPE, bus::QuitHandler::new(shutdown))?;
    Ok(dispatcher)
}
