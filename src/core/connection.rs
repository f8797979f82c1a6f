// src/core/connection.rs

//! Defines `Connection`, the gateway's view of one live client session.

use super::errors::GatewayError;
use super::protocol::{Message, codec};
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Session ids start at 1 so that `0` can mean "no client" in message headers.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// The registry key of a connection: the remote address of its transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The host part of the key, without the port.
    pub fn host(&self) -> &str {
        match self.0.rsplit_once(':') {
            Some((host, _port)) => host,
            None => &self.0,
        }
    }
}

impl From<SocketAddr> for ConnectionKey {
    fn from(addr: SocketAddr) -> Self {
        Self(format!("{}:{}", addr.ip(), addr.port()))
    }
}

impl From<&str> for ConnectionKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authentication progress of a session. Only ever moves forward:
/// `Unknown -> LoggedIn` on a login reply, `Unknown -> Registering -> LoggedIn` through
/// registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Unknown,
    Registering,
    LoggedIn,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unknown => "unknown",
            ConnectionState::Registering => "registering",
            ConnectionState::LoggedIn => "logged_in",
        };
        f.write_str(name)
    }
}

/// The sender side of a connection's outbound frame queue.
pub type FrameSender = mpsc::UnboundedSender<Frame>;
/// The receiving side, drained by the connection's writer task.
pub type FrameReceiver = mpsc::UnboundedReceiver<Frame>;

/// A handle to the transport of one connection.
///
/// Sending never touches the socket: frames are queued and written by the connection's
/// own writer task, so a handle can be used while the registry lock is held.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: FrameSender,
    terminate: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(tx: FrameSender, terminate: CancellationToken) -> Self {
        Self { tx, terminate }
    }

    /// Creates a handle together with the receiver its frames end up in.
    pub fn channel() -> (Self, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, CancellationToken::new()), rx)
    }

    /// Queues a raw frame. Returns false if the writer is gone.
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.tx.send(frame).is_ok()
    }

    /// Encodes `message` and queues it as a text frame.
    pub fn send_message(&self, message: &Message) -> Result<(), GatewayError> {
        let text = codec::encode(message)?;
        if !self.send_frame(Frame::text(text)) {
            debug!("Dropping outbound message, writer already closed.");
        }
        Ok(())
    }

    pub fn send_binary(&self, data: Bytes) -> bool {
        self.send_frame(Frame::Binary(data))
    }

    /// Forcibly ends the connection. The connection task closes the socket without a
    /// close handshake.
    pub fn terminate(&self) {
        self.terminate.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.is_cancelled()
    }

    /// The token the connection task watches for forced termination.
    pub fn termination_token(&self) -> CancellationToken {
        self.terminate.clone()
    }
}

/// One live client session.
#[derive(Debug, Clone)]
pub struct Connection {
    session_id: u64,
    address: ConnectionKey,
    state: ConnectionState,
    pub username: String,
    admin_status: i8,
    handle: ConnectionHandle,
    connected_at: Instant,
}

impl Connection {
    /// Creates a connection in the `Unknown` state with a fresh session id.
    pub fn new(address: ConnectionKey, handle: ConnectionHandle) -> Self {
        Self {
            session_id: next_session_id(),
            address,
            state: ConnectionState::Unknown,
            username: String::new(),
            admin_status: 0,
            handle,
            connected_at: Instant::now(),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn address(&self) -> &ConnectionKey {
        &self.address
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == ConnectionState::LoggedIn
    }

    pub fn admin_status(&self) -> i8 {
        self.admin_status
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Marks a registration request as sent to the backend.
    pub fn begin_registration(&mut self) -> Result<(), GatewayError> {
        self.advance(ConnectionState::Unknown, ConnectionState::Registering)
    }

    /// Applies a successful login reply. Only an `Unknown` session can log in.
    pub fn complete_login(&mut self, admin_status: i8) -> Result<(), GatewayError> {
        self.advance(ConnectionState::Unknown, ConnectionState::LoggedIn)?;
        self.admin_status = admin_status;
        Ok(())
    }

    /// Applies a successful registration reply. The session logs in as a regular user.
    pub fn complete_registration(&mut self) -> Result<(), GatewayError> {
        self.advance(ConnectionState::Registering, ConnectionState::LoggedIn)
    }

    fn advance(
        &mut self,
        expected: ConnectionState,
        next: ConnectionState,
    ) -> Result<(), GatewayError> {
        if self.state != expected {
            return Err(GatewayError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(
            "Session {}: state {} -> {}",
            self.session_id, self.state, next
        );
        self.state = next;
        Ok(())
    }

    /// Sends a message to this connection's client, logging encode failures.
    pub fn send(&self, message: &Message) {
        if let Err(e) = self.handle.send_message(message) {
            warn!(
                "Session {}: failed to encode outbound {}: {}",
                self.session_id,
                message.payload.name(),
                e
            );
        }
    }

    pub fn terminate(&self) {
        self.handle.terminate();
    }
}
