// src/core/protocol/messages.rs

//! The message model shared by both directions of the gateway.
//!
//! Every message kind is a variant of the closed [`Payload`] enum and carries an explicit
//! numeric discriminant (its type id). Handlers match on the variant they expect, so a
//! message can never be "cast" into the wrong payload type.

use serde::{Deserialize, Serialize};

pub const LOGIN_MESSAGE_TYPE: u32 = 1;
pub const LOGIN_RESPONSE_MESSAGE_TYPE: u32 = 2;
pub const REGISTER_MESSAGE_TYPE: u32 = 3;
pub const REGISTER_RESPONSE_MESSAGE_TYPE: u32 = 4;
pub const CHAT_SEND_MESSAGE_TYPE: u32 = 5;
pub const CHAT_RECEIVE_MESSAGE_TYPE: u32 = 6;
pub const SEND_MAP_MESSAGE_TYPE: u32 = 7;
pub const ADMIN_QUIT_MESSAGE_TYPE: u32 = 8;

/// Server id meaning "any server" in the envelope's destination field.
pub const ANY_SERVER: u32 = 0;

/// Chat target that addresses every logged-in connection.
pub const CHAT_TARGET_ALL: &str = "all";

/// Routing information carried in front of every payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// True if the message was produced by a backend service rather than a client.
    #[serde(default)]
    pub from_bus: bool,
    /// Session id of the client the message belongs to. `0` when there is none.
    #[serde(default)]
    pub client_id: u64,
    /// Id of the gateway that published the message.
    #[serde(default)]
    pub server_origin_id: u32,
    /// Id of the gateway the message is for, or [`ANY_SERVER`].
    #[serde(default)]
    pub server_destination_id: u32,
}

impl MessageHeader {
    /// The header a gateway puts on a request it publishes for one of its clients.
    pub fn for_client(client_id: u64, server_id: u32) -> Self {
        Self {
            from_bus: false,
            client_id,
            server_origin_id: server_id,
            server_destination_id: ANY_SERVER,
        }
    }

    /// Returns true if a gateway with `server_id` should accept this message.
    pub fn is_addressed_to(&self, server_id: u32) -> bool {
        self.server_destination_id == ANY_SERVER || self.server_destination_id == server_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Filled in by the gateway with the client's remote address.
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub admin_status: i8,
    pub error_number: i32,
    #[serde(default)]
    pub error_str: String,
}

impl LoginResponse {
    /// Error number the backend uses for accounts that are not allowed in (bans).
    pub const BANNED: i32 = -2;

    pub fn success(admin_status: i8) -> Self {
        Self {
            admin_status,
            error_number: 0,
            error_str: String::new(),
        }
    }

    /// A rejection generated by the gateway itself.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            admin_status: 0,
            error_number: -1,
            error_str: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub error_number: i32,
    #[serde(default)]
    pub error_str: String,
}

impl RegisterResponse {
    pub fn success() -> Self {
        Self {
            error_number: 0,
            error_str: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            error_number: -1,
            error_str: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSend {
    /// Set by the gateway from the authenticated session; ignored when sent by a client.
    #[serde(default)]
    pub from_username: String,
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReceive {
    pub from_username: String,
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMap {
    pub map_data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminQuit {}

/// All message kinds understood by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Login(LoginRequest),
    LoginResponse(LoginResponse),
    Register(RegisterRequest),
    RegisterResponse(RegisterResponse),
    ChatSend(ChatSend),
    ChatReceive(ChatReceive),
    SendMap(SendMap),
    AdminQuit(AdminQuit),
}

impl Payload {
    /// The numeric type id used on the wire and as the dispatch key.
    pub fn message_type(&self) -> u32 {
        match self {
            Payload::Login(_) => LOGIN_MESSAGE_TYPE,
            Payload::LoginResponse(_) => LOGIN_RESPONSE_MESSAGE_TYPE,
            Payload::Register(_) => REGISTER_MESSAGE_TYPE,
            Payload::RegisterResponse(_) => REGISTER_RESPONSE_MESSAGE_TYPE,
            Payload::ChatSend(_) => CHAT_SEND_MESSAGE_TYPE,
            Payload::ChatReceive(_) => CHAT_RECEIVE_MESSAGE_TYPE,
            Payload::SendMap(_) => SEND_MAP_MESSAGE_TYPE,
            Payload::AdminQuit(_) => ADMIN_QUIT_MESSAGE_TYPE,
        }
    }

    /// A short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Payload::Login(_) => "login",
            Payload::LoginResponse(_) => "login_response",
            Payload::Register(_) => "register",
            Payload::RegisterResponse(_) => "register_response",
            Payload::ChatSend(_) => "chat_send",
            Payload::ChatReceive(_) => "chat_receive",
            Payload::SendMap(_) => "send_map",
            Payload::AdminQuit(_) => "admin_quit",
        }
    }

    /// Whether a bus record carrying this payload is a reply to one specific session.
    ///
    /// Replies are dropped when their session is no longer connected here. Fan-out
    /// payloads are delivered regardless of where the sender is connected.
    pub fn requires_session(&self) -> bool {
        !matches!(self, Payload::ChatSend(_) | Payload::AdminQuit(_))
    }
}

/// A decoded message: routing header plus typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub payload: Payload,
}

impl Message {
    pub fn new(header: MessageHeader, payload: Payload) -> Self {
        Self { header, payload }
    }

    /// A message sent from the gateway to a client. Clients ignore the header.
    pub fn to_client(payload: Payload) -> Self {
        Self {
            header: MessageHeader::default(),
            payload,
        }
    }

    pub fn message_type(&self) -> u32 {
        self.payload.message_type()
    }
}
