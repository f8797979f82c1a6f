// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

use realmgate::core::bus::memory::MemoryBus;
use realmgate::core::bus::{BusProducer, inbound_topics};
use realmgate::core::bus_loop::{BusLoop, RecordOutcome};
use realmgate::core::connection::{ConnectionHandle, ConnectionKey, FrameReceiver};
use realmgate::core::dispatcher::Publication;
use realmgate::core::handlers;
use realmgate::core::network::{ClientEvents, FrameOutcome};
use realmgate::core::protocol::codec;
use realmgate::core::protocol::messages::LoginResponse;
use realmgate::core::registry::Registry;
use realmgate::core::shutdown::ShutdownContext;
use realmgate::{Message, MessageHeader, Payload};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as Frame;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// The server id every test gateway runs as.
pub const SERVER_ID: u32 = 7;

/// A gateway without sockets: client frames are fed straight into the network events and
/// the in-process bus plays the part of the backend services.
pub struct TestContext {
    pub bus: MemoryBus,
    pub registry: Registry,
    pub shutdown: ShutdownContext,
    pub events: ClientEvents,
    pub bus_loop: BusLoop,
}

impl TestContext {
    pub fn new() -> Self {
        // Initialize tracing (ignore error if already initialized)
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new("warn"))
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();

        let bus = MemoryBus::with_capture();
        let registry = Registry::new();
        let shutdown = ShutdownContext::new();
        let producer: Arc<dyn BusProducer> = Arc::new(bus.producer());
        let consumer = Box::new(bus.consumer(&inbound_topics(SERVER_ID)));

        let client_dispatcher =
            handlers::client_dispatcher(SERVER_ID).expect("client dispatcher");
        let bus_dispatcher =
            handlers::bus_dispatcher(shutdown.clone()).expect("bus dispatcher");

        let events = ClientEvents::new(
            registry.clone(),
            Arc::new(client_dispatcher),
            producer.clone(),
        );
        let bus_loop = BusLoop::new(
            SERVER_ID,
            registry.clone(),
            bus_dispatcher,
            producer,
            consumer,
            shutdown.clone(),
        )
        .with_poll_timeout(Duration::from_millis(1));

        Self {
            bus,
            registry,
            shutdown,
            events,
            bus_loop,
        }
    }

    /// Opens a session for a client at `addr`.
    pub fn connect(&self, addr: &str) -> TestClient {
        let (handle, rx) = ConnectionHandle::channel();
        let key = ConnectionKey::from(addr);
        let session_id = self
            .events
            .on_connect(key.clone(), handle.clone())
            .expect("connect");
        TestClient {
            key,
            session_id,
            handle,
            rx,
        }
    }

    /// Sends `payload` from the client as a text frame.
    pub fn send(&self, client: &TestClient, payload: Payload) -> FrameOutcome {
        let text = codec::encode(&Message::to_client(payload)).expect("encode");
        self.events.on_text(&client.key, &text)
    }

    pub fn send_raw(&self, client: &TestClient, text: &str) -> FrameOutcome {
        self.events.on_text(&client.key, text)
    }

    /// Publishes a backend reply for `session_id` and runs one bus loop iteration.
    pub fn reply_to(&mut self, session_id: u64, payload: Payload) -> RecordOutcome {
        let header = MessageHeader {
            from_bus: true,
            client_id: session_id,
            server_origin_id: 0,
            server_destination_id: SERVER_ID,
        };
        self.inject(Message::new(header, payload))
    }

    /// Delivers `message` on the bus and runs one bus loop iteration.
    pub fn inject(&mut self, message: Message) -> RecordOutcome {
        self.bus.inject(&message).expect("inject");
        self.bus_loop.run_once()
    }

    pub fn published(&self) -> Vec<Publication> {
        self.bus.take_published()
    }

    /// Connects a client and walks it through a successful login.
    pub fn logged_in(&mut self, addr: &str, username: &str, admin_status: i8) -> TestClient {
        let mut client = self.connect(addr);
        self.send(&client, login(username, "secret"));
        self.published();
        self.reply_to(
            client.session_id,
            Payload::LoginResponse(LoginResponse::success(admin_status)),
        );
        client.drain();
        client
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The client side of a session: what the gateway queued for its transport.
pub struct TestClient {
    pub key: ConnectionKey,
    pub session_id: u64,
    pub handle: ConnectionHandle,
    rx: FrameReceiver,
}

impl TestClient {
    /// The next queued frame, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// The next queued text frame, decoded.
    pub fn next_message(&mut self) -> Option<Message> {
        while let Some(frame) = self.next_frame() {
            if let Frame::Text(text) = frame {
                return codec::decode(text.as_str()).expect("decode");
            }
        }
        None
    }

    /// All queued messages.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Some(message) = self.next_message() {
            messages.push(message);
        }
        messages
    }

    pub fn is_terminated(&self) -> bool {
        self.handle.is_terminated()
    }
}

pub fn login(username: &str, password: &str) -> Payload {
    Payload::Login(realmgate::core::protocol::messages::LoginRequest {
        username: username.to_string(),
        password: password.to_string(),
        ip: String::new(),
    })
}

pub fn register(username: &str, password: &str, email: &str) -> Payload {
    Payload::Register(realmgate::core::protocol::messages::RegisterRequest {
        username: username.to_string(),
        password: password.to_string(),
        email: email.to_string(),
        ip: String::new(),
    })
}

pub fn chat(target: &str, message: &str) -> Payload {
    Payload::ChatSend(realmgate::core::protocol::messages::ChatSend {
        from_username: String::new(),
        target: target.to_string(),
        message: message.to_string(),
    })
}

/// Extracts the login response carried by `message`, panicking otherwise.
pub fn as_login_response(message: &Message) -> &LoginResponse {
    match &message.payload {
        Payload::LoginResponse(response) => response,
        other => panic!("expected a login response, got {other:?}"),
    }
}
