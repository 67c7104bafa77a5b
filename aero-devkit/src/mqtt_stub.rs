/*!
Mock MQTT client for tests without a broker

Records every publish and can be told to reject given topics, so bus
publisher behaviour is observable from tests.
*/

use aero_monitor::sinks::BusClient;
use aero_monitor::SinkError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct MockMessage {
    pub topic: String,
    pub payload: String,
}

/// Stand-in for `rumqttc::AsyncClient` on the publishing side
#[derive(Clone, Default)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    rejected_topics: Arc<Mutex<HashSet<String>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later publish to `topic` fail.
    pub fn reject_topic(&self, topic: &str) {
        self.rejected_topics.lock().unwrap().insert(topic.to_string());
    }

    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Payloads of a topic parsed as numbers, in publish order.
    pub fn values(&self, topic: &str) -> Vec<f64> {
        self.find_messages_by_topic(topic)
            .iter()
            .map(|msg| msg.payload.parse().unwrap())
            .collect()
    }

    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.rejected_topics.lock().unwrap().clear();
    }
}

impl BusClient for MockMqttClient {
    fn publish(&self, topic: &str, payload: String) -> Result<(), SinkError> {
        if self.rejected_topics.lock().unwrap().contains(topic) {
            return Err(SinkError::Publish { topic: topic.to_string(), reason: "rejected by mock".into() });
        }
        tracing::debug!("[MOCK] published to {}: {}", topic, payload);
        self.published_messages
            .lock()
            .unwrap()
            .push(MockMessage { topic: topic.to_string(), payload });
        Ok(())
    }
}
