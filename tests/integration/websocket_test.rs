// tests/integration/websocket_test.rs

//! Drives the gateway over real WebSocket connections on a loopback listener.

use super::test_helpers::*;
use futures::{SinkExt, StreamExt};
use realmgate::core::bus::USER_ACCESS_CONTROL_TOPIC;
use realmgate::core::protocol::codec;
use realmgate::core::protocol::messages::LoginResponse;
use realmgate::server::{NetworkLoop, ShutdownOrchestrator, ShutdownOutcome};
use realmgate::{Message, Payload};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_tungstenite::tungstenite::Message as Frame;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn start_network(ctx: &TestContext, max_clients: usize) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let network = NetworkLoop::new(
        listener,
        ctx.events.clone(),
        Arc::new(Semaphore::new(max_clients)),
        ctx.shutdown.clone(),
    );
    let url = format!("ws://{}", network.local_addr().unwrap());
    (url, tokio::spawn(network.run()))
}

/// Polls `check` until it returns true or the timeout expires.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn test_login_over_websocket() {
    let mut ctx = TestContext::new();
    let (url, _network) = start_network(&ctx, 16).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let registry = ctx.registry.clone();
    assert!(eventually(|| registry.len() == 1).await);

    let text = codec::encode(&Message::to_client(login("alice", "secret"))).unwrap();
    ws.send(Frame::text(text)).await.unwrap();

    let bus = ctx.bus.clone();
    let mut published = Vec::new();
    assert!(
        eventually(|| {
            published.extend(bus.take_published());
            !published.is_empty()
        })
        .await
    );
    assert_eq!(published[0].topic, USER_ACCESS_CONTROL_TOPIC);
    let session_id = published[0].message.header.client_id;
    assert!(ctx.registry.find_by_session_id(session_id).is_some());
    ctx.reply_to(session_id, Payload::LoginResponse(LoginResponse::success(0)));

    let frame = tokio::time::timeout(TIMEOUT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let Frame::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    let message = codec::decode(text.as_str()).unwrap().unwrap();
    assert_eq!(as_login_response(&message).error_number, 0);
    assert!(ctx.registry.find_by_session_id(session_id).unwrap().is_logged_in());
}

#[tokio::test]
async fn test_binary_echo_over_websocket() {
    let ctx = TestContext::new();
    let (url, _network) = start_network(&ctx, 16).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    ws.send(Frame::binary(vec![1u8, 2, 3])).await.unwrap();

    let frame = tokio::time::timeout(TIMEOUT, ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame, Frame::binary(vec![1u8, 2, 3]));
}

#[tokio::test]
async fn test_malformed_frame_closes_websocket() {
    let ctx = TestContext::new();
    let (url, _network) = start_network(&ctx, 16).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let registry = ctx.registry.clone();
    assert!(eventually(|| registry.len() == 1).await);

    ws.send(Frame::text("not a message")).await.unwrap();

    // The server drops the socket; the stream ends or errors.
    let ended = tokio::time::timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Frame::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok());
    assert!(eventually(|| registry.is_empty()).await);
}

#[tokio::test]
async fn test_disconnect_removes_session() {
    let ctx = TestContext::new();
    let (url, _network) = start_network(&ctx, 16).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let registry = ctx.registry.clone();
    assert!(eventually(|| registry.len() == 1).await);

    ws.close(None).await.unwrap();

    assert!(eventually(|| registry.is_empty()).await);
}

#[tokio::test]
async fn test_client_limit_closes_excess_connections() {
    let ctx = TestContext::new();
    let (url, _network) = start_network(&ctx, 1).await;

    let (_first, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let registry = ctx.registry.clone();
    assert!(eventually(|| registry.len() == 1).await);

    let second = tokio::time::timeout(TIMEOUT, tokio_tungstenite::connect_async(url.as_str()))
        .await
        .unwrap();
    assert!(second.is_err());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_shutdown_joins_network_loop() {
    let ctx = TestContext::new();
    let (url, network) = start_network(&ctx, 16).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let registry = ctx.registry.clone();
    assert!(eventually(|| registry.len() == 1).await);

    let producer = Arc::new(ctx.bus.producer());
    let bus = ctx.bus.clone();
    let orchestrator = ShutdownOrchestrator::new(
        ctx.shutdown.clone(),
        producer,
        Duration::from_secs(2),
    );
    let bus_loop = ctx.bus_loop;
    let bus_task = tokio::task::spawn_blocking(move || bus_loop.run());

    let outcome = orchestrator.run(bus_task, network).await;

    assert_eq!(outcome, ShutdownOutcome::Joined);
    assert!(bus.is_consumer_closed());
    assert!(bus.is_producer_closed());
    assert!(registry.is_empty());
    // The client is told the server is going away.
    let frame = tokio::time::timeout(TIMEOUT, ws.next()).await.unwrap();
    assert!(matches!(frame, Some(Ok(Frame::Close(_))) | Some(Err(_)) | None));
}
