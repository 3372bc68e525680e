#![allow(dead_code)]

use async_trait::async_trait;
use cat_events::api::{create_router, AppState};
use cat_events::config::Config;
use cat_events::events::Event;
use cat_events::kafka::KeyStrategy;
use cat_events::{DeliveryReceipt, Error, EventPublisher, Result};
use parking_lot::Mutex;
use std::env;
use std::sync::Arc;

/// Keeps every event it is asked to publish and acknowledges it.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &Event) -> Result<DeliveryReceipt> {
        let mut events = self.events.lock();
        events.push(event.clone());
        Ok(DeliveryReceipt {
            topic: event.topic().to_string(),
            partition: 0,
            offset: events.len() as i64 - 1,
            attempts: 1,
        })
    }
}

/// Fails every publish the way a broker without enough replicas would.
pub struct RejectingPublisher {
    pub message: String,
}

#[async_trait]
impl EventPublisher for RejectingPublisher {
    async fn publish(&self, _event: &Event) -> Result<DeliveryReceipt> {
        Err(Error::delivery(self.message.clone()))
    }
}

pub fn router_with(publisher: Arc<dyn EventPublisher>, key_strategy: KeyStrategy) -> axum::Router {
    create_router(AppState::new(publisher, key_strategy))
}

/// Configuration pointing at `TEST_KAFKA_BROKERS` (default `localhost:9092`).
pub fn get_test_config() -> Config {
    let mut config = Config::default();
    config.kafka.brokers = env::var("TEST_KAFKA_BROKERS")
        .unwrap_or_else(|_| "localhost:9092".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .collect();
    config.kafka.create_topics = true;
    config.publish.ack_timeout_ms = 10_000;
    config
}
