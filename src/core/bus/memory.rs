// src/core/bus/memory.rs

//! An in-process bus.
//!
//! Records published to a topic the consumer subscribed to are looped back to it, like a
//! single-node broker would. Inbound records can be injected directly, and a bus built
//! with [`MemoryBus::with_capture`] also keeps a log of everything published, which is how
//! tests play the role of backend services.

use super::{BusConsumer, BusProducer};
use crate::core::dispatcher::Publication;
use crate::core::errors::GatewayError;
use crate::core::protocol::{Message, codec};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct Shared {
    subscriptions: Mutex<HashSet<String>>,
    capture: bool,
    published: Mutex<Vec<Publication>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    available: Condvar,
    polls: AtomicU64,
    producer_closed: AtomicBool,
    consumer_closed: AtomicBool,
}

impl Shared {
    fn push_inbound(&self, bytes: Vec<u8>) {
        self.inbound.lock().push_back(bytes);
        self.available.notify_one();
    }
}

/// A handle on an in-process bus. Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryBus {
    shared: Arc<Shared>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that records every publication until [`MemoryBus::take_published`] drains
    /// it. Unbounded, so only for tests and short local runs.
    pub fn with_capture() -> Self {
        Self {
            shared: Arc::new(Shared {
                capture: true,
                ..Shared::default()
            }),
        }
    }

    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer {
            shared: self.shared.clone(),
        }
    }

    /// Creates the consumer and subscribes it to `topics`.
    pub fn consumer<S: AsRef<str>>(&self, topics: &[S]) -> MemoryConsumer {
        let mut subscriptions = self.shared.subscriptions.lock();
        subscriptions.extend(topics.iter().map(|t| t.as_ref().to_string()));
        MemoryConsumer {
            shared: self.shared.clone(),
        }
    }

    /// Delivers `message` to the consumer as if a backend service had published it.
    pub fn inject(&self, message: &Message) -> Result<(), GatewayError> {
        let text = codec::encode(message)?;
        self.shared.push_inbound(text.into_bytes());
        Ok(())
    }

    /// Delivers raw record bytes to the consumer.
    pub fn inject_raw(&self, bytes: impl Into<Vec<u8>>) {
        self.shared.push_inbound(bytes.into());
    }

    /// Takes everything published so far. Always empty unless the bus was built with
    /// [`MemoryBus::with_capture`].
    pub fn take_published(&self) -> Vec<Publication> {
        std::mem::take(&mut *self.shared.published.lock())
    }

    /// Number of records waiting for the consumer.
    pub fn pending_inbound(&self) -> usize {
        self.shared.inbound.lock().len()
    }

    pub fn poll_count(&self) -> u64 {
        self.shared.polls.load(Ordering::Relaxed)
    }

    pub fn is_producer_closed(&self) -> bool {
        self.shared.producer_closed.load(Ordering::Acquire)
    }

    pub fn is_consumer_closed(&self) -> bool {
        self.shared.consumer_closed.load(Ordering::Acquire)
    }
}

pub struct MemoryProducer {
    shared: Arc<Shared>,
}

impl BusProducer for MemoryProducer {
    fn enqueue(&self, topic: &str, message: &Message) -> Result<(), GatewayError> {
        if self.shared.producer_closed.load(Ordering::Acquire) {
            return Err(GatewayError::Bus("producer is closed".into()));
        }
        let bytes = codec::encode(message)?.into_bytes();
        let looped_back = self.shared.subscriptions.lock().contains(topic);
        if self.shared.capture {
            self.shared.published.lock().push(Publication {
                topic: topic.to_string(),
                message: message.clone(),
            });
        }
        if looped_back {
            debug!("Looping record on '{}' back to the local consumer.", topic);
            self.shared.push_inbound(bytes);
        }
        Ok(())
    }

    fn poll(&self, _timeout: Duration) {
        self.shared.polls.fetch_add(1, Ordering::Relaxed);
    }

    fn close(&self) {
        self.shared.producer_closed.store(true, Ordering::Release);
    }
}

pub struct MemoryConsumer {
    shared: Arc<Shared>,
}

impl BusConsumer for MemoryConsumer {
    fn try_get_message(&mut self, timeout: Duration) -> Result<Option<Message>, GatewayError> {
        let bytes = {
            let mut inbound = self.shared.inbound.lock();
            if inbound.is_empty() {
                self.shared.available.wait_for(&mut inbound, timeout);
            }
            inbound.pop_front()
        };
        match bytes {
            Some(bytes) => codec::decode_bytes(&bytes),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.shared.consumer_closed.store(true, Ordering::Release);
        self.shared.subscriptions.lock().clear();
    }
}
