// tests/property/registry_test.rs

//! Property-based tests for the connection registry
//! Tests that arbitrary add/remove sequences keep the registry consistent with a model

use proptest::prelude::*;
use realmgate::core::connection::{Connection, ConnectionHandle, ConnectionKey};
use realmgate::core::registry::Registry;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    Add(u8),
    Remove(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..16).prop_map(Op::Add),
        (0u8..16).prop_map(Op::Remove),
    ]
}

fn key(slot: u8) -> ConnectionKey {
    ConnectionKey::new(format!("10.0.0.{slot}:7000"))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_registry_matches_model(ops in prop::collection::vec(op(), 1..100)) {
        let registry = Registry::new();
        // slot -> session id of the entry that should be present
        let mut model: HashMap<u8, u64> = HashMap::new();

        for op in ops {
            match op {
                Op::Add(slot) => {
                    let (handle, _rx) = ConnectionHandle::channel();
                    let connection = Connection::new(key(slot), handle);
                    let session_id = connection.session_id();
                    let result = registry.add(connection);
                    if model.contains_key(&slot) {
                        prop_assert!(result.is_err());
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(slot, session_id);
                    }
                }
                Op::Remove(slot) => {
                    let removed = registry.remove(&key(slot)).map(|c| c.session_id());
                    prop_assert_eq!(removed, model.remove(&slot));
                }
            }
        }

        prop_assert_eq!(registry.len(), model.len());
        for slot in 0u8..16 {
            let found = registry.find_by_address(&key(slot)).map(|c| c.session_id());
            prop_assert_eq!(found, model.get(&slot).copied());
            if let Some(session_id) = found {
                let by_session = registry.find_by_session_id(session_id);
                prop_assert_eq!(by_session.map(|c| c.address().clone()), Some(key(slot)));
            }
        }
    }

    #[test]
    fn test_connection_key_host_strips_port(
        a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255, port in 1u16..=u16::MAX
    ) {
        let addr: std::net::SocketAddr = format!("{a}.{b}.{c}.{d}:{port}").parse().unwrap();
        let key = ConnectionKey::from(addr);
        prop_assert_eq!(key.host(), format!("{a}.{b}.{c}.{d}"));
        prop_assert_eq!(key.as_str(), format!("{a}.{b}.{c}.{d}:{port}"));
    }
}
