// src/core/protocol/codec.rs

//! JSON encoding of [`Message`]s for client text frames and bus records.
//!
//! Both directions use the same envelope:
//! `{"type": <id>, "sender": {..header..}, "content": {..payload..}}`.
//! Clients usually omit `sender`; it defaults to an empty header.

use super::messages::*;
use crate::core::GatewayError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    message_type: u32,
    #[serde(default)]
    sender: MessageHeader,
    #[serde(default)]
    content: Value,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    #[serde(rename = "type")]
    message_type: u32,
    sender: &'a MessageHeader,
    content: Value,
}

/// Decodes a message from its JSON text.
///
/// Returns `Ok(None)` for a well-formed envelope whose type id is not known to the
/// gateway. Returns a [`GatewayError::Serialization`] if the text is not a valid envelope
/// or the content does not match the declared type.
pub fn decode(text: &str) -> Result<Option<Message>, GatewayError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    let payload = match decode_payload(raw.message_type, raw.content)? {
        Some(payload) => payload,
        None => return Ok(None),
    };
    Ok(Some(Message::new(raw.sender, payload)))
}

/// Decodes a bus record payload. Non UTF-8 bytes are a serialization failure.
pub fn decode_bytes(bytes: &[u8]) -> Result<Option<Message>, GatewayError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| GatewayError::Serialization(format!("record is not UTF-8: {e}")))?;
    decode(text)
}

/// Encodes a message into its JSON text.
pub fn encode(message: &Message) -> Result<String, GatewayError> {
    let envelope = EnvelopeRef {
        message_type: message.message_type(),
        sender: &message.header,
        content: encode_payload(&message.payload)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

fn decode_payload(message_type: u32, content: Value) -> Result<Option<Payload>, GatewayError> {
    let payload = match message_type {
        LOGIN_MESSAGE_TYPE => Payload::Login(serde_json::from_value(content)?),
        LOGIN_RESPONSE_MESSAGE_TYPE => Payload::LoginResponse(serde_json::from_value(content)?),
        REGISTER_MESSAGE_TYPE => Payload::Register(serde_json::from_value(content)?),
        REGISTER_RESPONSE_MESSAGE_TYPE => {
            Payload::RegisterResponse(serde_json::from_value(content)?)
        }
        CHAT_SEND_MESSAGE_TYPE => Payload::ChatSend(serde_json::from_value(content)?),
        CHAT_RECEIVE_MESSAGE_TYPE => Payload::ChatReceive(serde_json::from_value(content)?),
        SEND_MAP_MESSAGE_TYPE => Payload::SendMap(serde_json::from_value(content)?),
        // An admin quit has no fields, so a missing `content` is fine.
        ADMIN_QUIT_MESSAGE_TYPE => Payload::AdminQuit(AdminQuit::default()),
        _ => return Ok(None),
    };
    Ok(Some(payload))
}

fn encode_payload(payload: &Payload) -> Result<Value, GatewayError> {
    let value = match payload {
        Payload::Login(p) => serde_json::to_value(p)?,
        Payload::LoginResponse(p) => serde_json::to_value(p)?,
        Payload::Register(p) => serde_json::to_value(p)?,
        Payload::RegisterResponse(p) => serde_json::to_value(p)?,
        Payload::ChatSend(p) => serde_json::to_value(p)?,
        Payload::ChatReceive(p) => serde_json::to_value(p)?,
        Payload::SendMap(p) => serde_json::to_value(p)?,
        Payload::AdminQuit(p) => serde_json::to_value(p)?,
    };
    Ok(value)
}
