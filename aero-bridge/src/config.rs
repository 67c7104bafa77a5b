use aero_monitor::config::{InfluxConfig, MqttConfig};
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub mqtt: MqttConfig,
    pub influx: InfluxConfig,
}

impl BridgeConfig {
    /// Built from environment variables only; unset keys keep their defaults.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut mqtt = MqttConfig { client_id: "aero-bridge".to_string(), ..MqttConfig::default() };
        let mut influx = InfluxConfig::default();

        if let Some(host) = lookup("MQTT_HOST") {
            mqtt.host = host;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            mqtt.port = port.parse().with_context(|| format!("MQTT_PORT is not a port: {port}"))?;
        }
        mqtt.username = lookup("MQTT_USER");
        mqtt.password = lookup("MQTT_PASS");

        if let Some(url) = lookup("INFLUX_URL") {
            influx.url = url;
        }
        if let Some(db) = lookup("INFLUX_DB") {
            influx.database = db;
        }
        influx.token = lookup("INFLUX_TOKEN");

        Ok(Self { mqtt, influx })
    }
}
