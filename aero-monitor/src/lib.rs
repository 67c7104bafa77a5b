//! Aero Monitor - Raspberry Pi environment sensor daemon
//!
//! Polls a light sensor (RC charge timing) and a DHT11 on independent
//! intervals and relays every reading to MQTT and InfluxDB:
//! - `scheduler`: the polling loop with per-sensor failure isolation
//! - `sensors`: sensor ports and their hardware adapters
//! - `sinks`: MQTT publisher and InfluxDB writer
//! - `config`: TOML + environment configuration

pub mod clock;
pub mod config;
pub mod daemon;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod sensors;
pub mod sinks;

pub use clock::{Clock, StopSignal, SystemClock};
pub use config::MonitorConfig;
pub use error::{ConfigError, FailureKind, MonitorError, ReadFailure, SinkError};
pub use model::{Reading, Sample, SensorId, Timestamp};
pub use scheduler::{ScheduleState, Scheduler, SensorSpec, SensorStats, TickEvent};
pub use sensors::SensorPort;
pub use sinks::ReadingSink;
