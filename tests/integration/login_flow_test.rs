// tests/integration/login_flow_test.rs

//! End-to-end session flows: connect, login, register, and the rejections in between.

use super::fixtures::*;
use super::test_helpers::*;
use realmgate::core::bus::{BROADCAST_TOPIC, USER_ACCESS_CONTROL_TOPIC};
use realmgate::core::bus_loop::RecordOutcome;
use realmgate::core::connection::ConnectionState;
use realmgate::core::dispatcher::DispatchOutcome;
use realmgate::core::network::FrameOutcome;
use realmgate::core::protocol::messages::{AdminQuit, LoginResponse, RegisterResponse};
use realmgate::Payload;

#[tokio::test]
async fn test_connect_creates_unknown_session() {
    let ctx = TestContext::new();
    let client = ctx.connect(ALICE_ADDR);

    assert_eq!(ctx.registry.len(), 1);
    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.state(), ConnectionState::Unknown);
    assert_eq!(connection.session_id(), client.session_id);
}

#[tokio::test]
async fn test_login_round_trip() {
    let mut ctx = TestContext::new();
    let mut client = ctx.connect(ALICE_ADDR);

    let outcome = ctx.send_raw(&client, LOGIN_FRAME);
    assert_eq!(outcome, FrameOutcome::Dispatched(DispatchOutcome::Handled));

    let published = ctx.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, USER_ACCESS_CONTROL_TOPIC);
    let header = published[0].message.header;
    assert_eq!(header.client_id, client.session_id);
    assert_eq!(header.server_origin_id, SERVER_ID);
    match &published[0].message.payload {
        Payload::Login(request) => {
            assert_eq!(request.username, "alice");
            assert_eq!(request.password, "hunter2");
            assert_eq!(request.ip, "10.0.0.1");
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert!(client.drain().is_empty());

    let outcome = ctx.reply_to(
        client.session_id,
        Payload::LoginResponse(LoginResponse::success(0)),
    );
    assert_eq!(outcome, RecordOutcome::Dispatched(DispatchOutcome::Handled));

    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.state(), ConnectionState::LoggedIn);
    assert_eq!(connection.username, "alice");

    let response = client.next_message().unwrap();
    assert_eq!(as_login_response(&response).error_number, 0);
}

#[tokio::test]
async fn test_login_rejected_when_already_logged_in() {
    let mut ctx = TestContext::new();
    let mut client = ctx.logged_in(ALICE_ADDR, "alice", 0);

    ctx.send(&client, login("alice", "again"));

    assert!(ctx.published().is_empty());
    let response = client.next_message().unwrap();
    let response = as_login_response(&response);
    assert_ne!(response.error_number, 0);
    assert_eq!(
        response.error_str,
        "Already logged in or awaiting response on register request."
    );
}

#[tokio::test]
async fn test_failed_login_keeps_session_unknown_and_allows_retry() {
    let mut ctx = TestContext::new();
    let mut client = ctx.connect(ALICE_ADDR);
    ctx.send(&client, login("alice", "wrong"));
    ctx.published();

    ctx.reply_to(
        client.session_id,
        Payload::LoginResponse(LoginResponse {
            admin_status: 0,
            error_number: 1,
            error_str: "Invalid credentials.".to_string(),
        }),
    );

    let response = client.next_message().unwrap();
    assert_eq!(as_login_response(&response).error_str, "Invalid credentials.");
    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.state(), ConnectionState::Unknown);
    assert!(!client.is_terminated());

    ctx.send(&client, login("alice", "right"));
    assert_eq!(ctx.published().len(), 1);
}

#[tokio::test]
async fn test_banned_login_sends_response_then_terminates() {
    let mut ctx = TestContext::new();
    let mut client = ctx.connect(ALICE_ADDR);
    ctx.send(&client, login("mallory", "secret"));

    ctx.reply_to(
        client.session_id,
        Payload::LoginResponse(LoginResponse {
            admin_status: 0,
            error_number: LoginResponse::BANNED,
            error_str: "Banned.".to_string(),
        }),
    );

    let response = client.next_message().unwrap();
    assert_eq!(
        as_login_response(&response).error_number,
        LoginResponse::BANNED
    );
    assert!(client.is_terminated());
}

#[tokio::test]
async fn test_register_flow() {
    let mut ctx = TestContext::new();
    let mut client = ctx.connect(BOB_ADDR);

    ctx.send(&client, register("bob", "secret", "bob@example.com"));
    let published = ctx.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, USER_ACCESS_CONTROL_TOPIC);
    assert!(matches!(
        &published[0].message.payload,
        Payload::Register(r) if r.email == "bob@example.com" && r.ip == "10.0.0.2"
    ));
    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.state(), ConnectionState::Registering);

    // A login while the registration is pending is refused.
    ctx.send(&client, login("bob", "secret"));
    assert!(ctx.published().is_empty());
    let response = client.next_message().unwrap();
    assert_ne!(as_login_response(&response).error_number, 0);

    ctx.reply_to(
        client.session_id,
        Payload::RegisterResponse(RegisterResponse::success()),
    );
    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.state(), ConnectionState::LoggedIn);
    assert_eq!(connection.admin_status(), 0);
    let response = client.next_message().unwrap();
    assert_eq!(
        response.payload,
        Payload::RegisterResponse(RegisterResponse::success())
    );
}

#[tokio::test]
async fn test_failed_register_stays_registering() {
    let mut ctx = TestContext::new();
    let mut client = ctx.connect(BOB_ADDR);
    ctx.send(&client, register("bob", "secret", "bob@example.com"));

    ctx.reply_to(
        client.session_id,
        Payload::RegisterResponse(RegisterResponse::rejected("Username taken.")),
    );

    let response = client.next_message().unwrap();
    assert!(matches!(
        response.payload,
        Payload::RegisterResponse(ref r) if r.error_str == "Username taken."
    ));
    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.state(), ConnectionState::Registering);
}

#[tokio::test]
async fn test_login_reply_does_not_log_in_a_registering_session() {
    let mut ctx = TestContext::new();
    let mut client = ctx.connect(BOB_ADDR);
    ctx.send(&client, register("bob", "secret", "bob@example.com"));
    ctx.published();

    let outcome = ctx.reply_to(
        client.session_id,
        Payload::LoginResponse(LoginResponse::success(1)),
    );

    assert!(matches!(
        outcome,
        RecordOutcome::Dispatched(DispatchOutcome::Failed(_))
    ));
    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.state(), ConnectionState::Registering);
    assert_eq!(connection.admin_status(), 0);
    assert!(client.drain().is_empty());

    // The registration reply still completes the session.
    ctx.reply_to(
        client.session_id,
        Payload::RegisterResponse(RegisterResponse::success()),
    );
    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.state(), ConnectionState::LoggedIn);
    assert_eq!(connection.admin_status(), 0);
}

#[tokio::test]
async fn test_late_login_reply_for_logged_in_session_is_a_handler_failure() {
    let mut ctx = TestContext::new();
    let client = ctx.logged_in(ALICE_ADDR, "alice", 0);

    let outcome = ctx.reply_to(
        client.session_id,
        Payload::LoginResponse(LoginResponse::success(1)),
    );

    assert!(matches!(
        outcome,
        RecordOutcome::Dispatched(DispatchOutcome::Failed(_))
    ));
    let connection = ctx.registry.find_by_address(&client.key).unwrap();
    assert_eq!(connection.admin_status(), 0);
}

#[tokio::test]
async fn test_chat_requires_login() {
    let ctx = TestContext::new();
    let mut client = ctx.connect(ALICE_ADDR);

    ctx.send(&client, chat("all", "hello"));

    assert!(ctx.published().is_empty());
    let response = client.next_message().unwrap();
    assert_eq!(as_login_response(&response).error_str, "Need to login.");
}

#[tokio::test]
async fn test_admin_quit_requires_admin() {
    let mut ctx = TestContext::new();
    let mut client = ctx.logged_in(ALICE_ADDR, "alice", 0);

    ctx.send(&client, Payload::AdminQuit(AdminQuit::default()));

    assert!(ctx.published().is_empty());
    let response = client.next_message().unwrap();
    assert_eq!(as_login_response(&response).error_str, "Not allowed.");
    assert!(!ctx.shutdown.is_triggered());
}

#[tokio::test]
async fn test_admin_quit_broadcasts_and_stops_the_gateway() {
    let mut ctx = TestContext::new();
    let admin = ctx.logged_in(ALICE_ADDR, "root", 1);

    ctx.send(&admin, Payload::AdminQuit(AdminQuit::default()));

    let published = ctx.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, BROADCAST_TOPIC);
    assert!(!ctx.shutdown.is_triggered());

    // The memory bus loops the broadcast back to this gateway's consumer.
    let outcome = ctx.bus_loop.run_once();
    assert_eq!(outcome, RecordOutcome::Dispatched(DispatchOutcome::Handled));
    assert!(ctx.shutdown.is_triggered());
}
