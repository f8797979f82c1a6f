// tests/property/routing_test.rs

//! Property-based tests for chat fan-out
//! Tests that deliveries reach exactly the logged-in sessions a target names

use crate::test_helpers::TestContext;
use proptest::prelude::*;
use realmgate::core::protocol::messages::ChatSend;
use realmgate::{Message, MessageHeader, Payload};

const NAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50, // Fewer cases, each one builds a gateway
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_chat_reaches_exactly_the_targeted_sessions(
        sessions in prop::collection::vec((0usize..NAMES.len(), any::<bool>()), 1..12),
        target in prop_oneof![Just("all".to_string()), (0usize..NAMES.len()).prop_map(|i| NAMES[i].to_string())],
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut ctx = TestContext::new();
            let mut clients = Vec::new();
            for (i, (name, logged_in)) in sessions.iter().enumerate() {
                let addr = format!("172.16.0.{}:{}", i + 1, 5000 + i);
                let client = if *logged_in {
                    ctx.logged_in(&addr, NAMES[*name], 0)
                } else {
                    let client = ctx.connect(&addr);
                    ctx.send(&client, crate::test_helpers::login(NAMES[*name], "pw"));
                    client
                };
                clients.push((NAMES[*name], *logged_in, client));
            }

            let delivery = Message::new(
                MessageHeader::default(),
                Payload::ChatSend(ChatSend {
                    from_username: "system".to_string(),
                    target: target.clone(),
                    message: "hello".to_string(),
                }),
            );
            ctx.inject(delivery);

            for (name, logged_in, client) in clients.iter_mut() {
                let got = client
                    .drain()
                    .iter()
                    .filter(|m| matches!(m.payload, Payload::ChatReceive(_)))
                    .count();
                let expected = *logged_in && (target == "all" || target == *name);
                assert_eq!(got, usize::from(expected), "{name} logged_in={logged_in} target={target}");
            }
        });
    }
}
