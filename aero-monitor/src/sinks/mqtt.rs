//! MQTT publisher sink
//!
//! Each reading field goes to its own topic as a bare decimal payload, e.g.
//! `aero/ambientTemp` → `72.5`. No JSON envelope.

use super::ReadingSink;
use crate::config::MqttConfig;
use crate::error::SinkError;
use crate::model::{Reading, Sample};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Non-blocking publish used from the scheduler thread.
pub trait BusClient: Send {
    fn publish(&self, topic: &str, payload: String) -> Result<(), SinkError>;
}

impl BusClient for AsyncClient {
    fn publish(&self, topic: &str, payload: String) -> Result<(), SinkError> {
        self.try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| SinkError::Publish { topic: topic.to_string(), reason: e.to_string() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topics {
    pub light: String,
    pub temperature: String,
    pub humidity: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            light: "aero/light".to_string(),
            temperature: "aero/ambientTemp".to_string(),
            humidity: "aero/ambientHumidity".to_string(),
        }
    }
}

impl Topics {
    /// Topic/value pairs for one reading, in publish order.
    pub fn messages(&self, reading: &Reading) -> Vec<(&str, f64)> {
        match *reading {
            Reading::Light { intensity } => vec![(self.light.as_str(), intensity)],
            Reading::Ambient { temperature_f, humidity_pct } => vec![
                (self.temperature.as_str(), temperature_f),
                (self.humidity.as_str(), humidity_pct),
            ],
        }
    }
}

pub struct BusPublisher<C> {
    client: C,
    topics: Topics,
}

impl<C: BusClient> BusPublisher<C> {
    pub fn new(client: C, topics: Topics) -> Self {
        Self { client, topics }
    }
}

impl<C: BusClient> ReadingSink for BusPublisher<C> {
    fn name(&self) -> &str {
        "mqtt"
    }

    /// Every topic is attempted; the first failure is reported.
    fn emit(&mut self, sample: &Sample) -> Result<(), SinkError> {
        let mut first_error = None;
        for (topic, value) in self.topics.messages(&sample.reading) {
            match self.client.publish(topic, value.to_string()) {
                Ok(()) => debug!(topic, value, "published"),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Build the client and its event loop from configuration.
pub fn connect(config: &MqttConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_clean_session(true);
    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        options.set_credentials(user, pass);
    }
    AsyncClient::new(options, config.queue_capacity)
}

/// Drive the MQTT connection in the background, reconnecting on error.
pub fn spawn_event_loop(mut eventloop: EventLoop) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => info!("MQTT connected"),
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_per_reading() {
        let topics = Topics::default();
        let ambient = Reading::Ambient { temperature_f: 72.5, humidity_pct: 41.0 };
        assert_eq!(
            topics.messages(&ambient),
            vec![("aero/ambientTemp", 72.5), ("aero/ambientHumidity", 41.0)]
        );
        assert_eq!(topics.messages(&Reading::Light { intensity: 3.0 }), vec![("aero/light", 3.0)]);
    }

    #[test]
    fn test_full_queue_is_a_sink_error() {
        let config = MqttConfig { queue_capacity: 1, ..MqttConfig::default() };
        let (client, _eventloop) = connect(&config);
        assert!(BusClient::publish(&client, "aero/light", "1".into()).is_ok());
        let err = BusClient::publish(&client, "aero/light", "2".into()).unwrap_err();
        assert!(matches!(err, SinkError::Publish { .. }));
    }
}
