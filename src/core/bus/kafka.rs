// src/core/bus/kafka.rs

//! Kafka bus backend built on rdkafka's poll-based clients.

use super::{BusConsumer, BusProducer};
use crate::core::errors::GatewayError;
use crate::core::protocol::{Message, codec};
use rdkafka::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Message as _;
use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use std::time::Duration;
use tracing::{error, info, warn};

/// How long `close` waits for queued records to reach the broker.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

pub struct KafkaProducer {
    producer: BaseProducer,
}

impl KafkaProducer {
    pub fn start(broker_list: &str) -> Result<Self, GatewayError> {
        let producer: BaseProducer = ClientConfig::new()
            .set("bootstrap.servers", broker_list)
            .set("message.timeout.ms", "5000")
            .create()?;
        info!(brokers = %broker_list, "Kafka producer started");
        Ok(Self { producer })
    }
}

impl BusProducer for KafkaProducer {
    fn enqueue(&self, topic: &str, message: &Message) -> Result<(), GatewayError> {
        let payload = codec::encode(message)?;
        let key = message.header.client_id.to_string();
        self.producer
            .send(BaseRecord::to(topic).key(&key).payload(&payload))
            .map_err(|(e, _)| GatewayError::Bus(format!("failed to enqueue on '{topic}': {e}")))
    }

    fn poll(&self, timeout: Duration) {
        self.producer.poll(timeout);
    }

    fn close(&self) {
        if let Err(e) = self.producer.flush(FLUSH_TIMEOUT) {
            warn!("Kafka producer flush on close failed: {}", e);
        }
    }
}

pub struct KafkaConsumer {
    consumer: BaseConsumer,
}

impl KafkaConsumer {
    pub fn start<S: AsRef<str>>(
        broker_list: &str,
        group_id: &str,
        topics: &[S],
    ) -> Result<Self, GatewayError> {
        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", broker_list)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .create()?;
        let topic_refs: Vec<&str> = topics.iter().map(|t| t.as_ref()).collect();
        consumer.subscribe(&topic_refs)?;
        info!(
            brokers = %broker_list,
            group = %group_id,
            topics = ?topic_refs,
            "Kafka consumer subscribed"
        );
        Ok(Self { consumer })
    }
}

impl BusConsumer for KafkaConsumer {
    fn try_get_message(&mut self, timeout: Duration) -> Result<Option<Message>, GatewayError> {
        match self.consumer.poll(timeout) {
            None => Ok(None),
            Some(Err(e)) => {
                error!("Kafka consumer error: {}", e);
                Ok(None)
            }
            Some(Ok(record)) => match record.payload() {
                Some(payload) => codec::decode_bytes(payload),
                None => Err(GatewayError::Serialization(format!(
                    "empty record at {}:{}@{}",
                    record.topic(),
                    record.partition(),
                    record.offset()
                ))),
            },
        }
    }

    fn close(&mut self) {
        self.consumer.unsubscribe();
    }
}
