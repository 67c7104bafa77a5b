//! Monitor configuration
//!
//! Handles:
//! - TOML file at `$AERO_MONITOR_CONFIG` (default `aero-monitor.toml`)
//! - Built-in defaults when the file is absent
//! - Credential overrides from `MQTT_USER`, `MQTT_PASS`, `INFLUX_TOKEN`
//! - Validation before the scheduler starts

use crate::error::ConfigError;
use crate::model::SensorId;
use crate::sensors::RcTiming;
use crate::sinks::Topics;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "AERO_MONITOR_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "aero-monitor.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub scheduler: SchedulerConfig,
    pub light: LightConfig,
    pub ambient: AmbientConfig,
    pub mqtt: MqttConfig,
    pub influx: InfluxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub idle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub enabled: bool,
    pub bcm_pin: u8,
    pub interval_secs: u64,
    pub discharge_ms: u64,
    pub timeout_ms: u64,
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub enabled: bool,
    /// IIO device directory of the dht11 driver
    pub device: PathBuf,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub queue_capacity: usize,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub topics: Topics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfluxApi {
    V1,
    V2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub enabled: bool,
    pub url: String,
    pub api: InfluxApi,
    /// v1 database
    pub database: String,
    /// v2 organisation and bucket
    pub org: Option<String>,
    pub bucket: Option<String>,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub host_tag: String,
    pub timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { idle_ms: 50 }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bcm_pin: 4,
            interval_secs: 20,
            discharge_ms: 100,
            timeout_ms: 2000,
            scale: 1000.0,
        }
    }
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device: PathBuf::from("/sys/bus/iio/devices/iio:device0"),
            interval_secs: 30,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 1883,
            client_id: "aero-monitor".to_string(),
            keep_alive_secs: 60,
            queue_capacity: 10,
            username: None,
            password: None,
            topics: Topics::default(),
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:8086".to_string(),
            api: InfluxApi::V1,
            database: "aero".to_string(),
            org: None,
            bucket: None,
            token: None,
            host_tag: "raspberrypi".to_string(),
            timeout_secs: 10,
        }
    }
}

impl SchedulerConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
}

impl LightConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timing(&self) -> RcTiming {
        RcTiming {
            discharge: Duration::from_millis(self.discharge_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            scale: self.scale,
        }
    }
}

impl AmbientConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl MonitorConfig {
    /// Load from `$AERO_MONITOR_CONFIG`, apply env credentials, validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let mut config = Self::load_from(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(user) = lookup("MQTT_USER") {
            self.mqtt.username = Some(user);
        }
        if let Some(pass) = lookup("MQTT_PASS") {
            self.mqtt.password = Some(pass);
        }
        if let Some(token) = lookup("INFLUX_TOKEN") {
            self.influx.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.mqtt.enabled && !self.influx.enabled {
            return Err(ConfigError::NoSinks);
        }
        if !self.light.enabled && !self.ambient.enabled {
            return Err(ConfigError::NoSensors);
        }
        if self.scheduler.idle_ms == 0 {
            return Err(invalid("scheduler.idle_ms", "must be positive"));
        }
        if self.light.enabled && self.light.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval(SensorId::Light));
        }
        if self.ambient.enabled && self.ambient.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval(SensorId::Ambient));
        }
        if self.light.enabled {
            if self.light.timeout_ms == 0 {
                return Err(invalid("light.timeout_ms", "must be positive"));
            }
            if !(self.light.scale.is_finite() && self.light.scale > 0.0) {
                return Err(invalid("light.scale", "must be a positive finite number"));
            }
        }
        if self.mqtt.enabled && self.mqtt.queue_capacity == 0 {
            return Err(invalid("mqtt.queue_capacity", "must be positive"));
        }
        if self.influx.enabled && self.influx.timeout_secs == 0 {
            return Err(invalid("influx.timeout_secs", "must be positive"));
        }
        if self.influx.enabled && self.influx.api == InfluxApi::V2 {
            if self.influx.org.is_none() {
                return Err(invalid("influx.org", "required for the v2 API"));
            }
            if self.influx.bucket.is_none() {
                return Err(invalid("influx.bucket", "required for the v2 API"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.light.bcm_pin, 4);
        assert_eq!(config.light.interval(), Duration::from_secs(20));
        assert_eq!(config.ambient.interval(), Duration::from_secs(30));
        assert_eq!(config.mqtt.topics.light, "aero/light");
        assert_eq!(config.influx.host_tag, "raspberrypi");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MonitorConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.mqtt.port, 1883);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aero-monitor.toml");
        std::fs::write(
            &path,
            r#"
[light]
interval_secs = 5

[influx]
api = "v2"
org = "home"
bucket = "aero"
"#,
        )
        .unwrap();

        let config = MonitorConfig::load_from(&path).unwrap();
        assert_eq!(config.light.interval_secs, 5);
        assert_eq!(config.light.bcm_pin, 4);
        assert_eq!(config.influx.api, InfluxApi::V2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_credentials() {
        let mut config = MonitorConfig::default();
        config.apply_env(|key| match key {
            "MQTT_USER" => Some("pi".to_string()),
            "MQTT_PASS" => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(config.mqtt.username.as_deref(), Some("pi"));
        assert_eq!(config.mqtt.password.as_deref(), Some("secret"));
        assert!(config.influx.token.is_none());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = MonitorConfig::default();
        config.mqtt.enabled = false;
        config.influx.enabled = false;
        assert_eq!(config.validate(), Err(ConfigError::NoSinks));

        let mut config = MonitorConfig::default();
        config.influx.api = InfluxApi::V2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "influx.org", .. })
        ));

        let mut config = MonitorConfig::default();
        config.light.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.ambient.interval_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval(SensorId::Ambient)));
    }

    #[test]
    fn test_scale_and_timeout_bounds() {
        for scale in [f64::INFINITY, f64::NAN, 0.0, -1.0] {
            let mut config = MonitorConfig::default();
            config.light.scale = scale;
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Invalid { field: "light.scale", .. })
            ));
        }

        let mut config = MonitorConfig::default();
        config.influx.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "influx.timeout_secs", .. })
        ));

        config.influx.enabled = false;
        assert!(config.validate().is_ok());
    }
}
