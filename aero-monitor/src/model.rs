//! Sensor readings and the samples handed to sinks

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Physical sensor kinds known to the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorId {
    Light,
    Ambient,
}

impl SensorId {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SensorId::Light => "light",
            SensorId::Ambient => "ambient",
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One measurement from a sensor port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Relative light level. Larger means darker (slower RC charge).
    Light { intensity: f64 },
    Ambient { temperature_f: f64, humidity_pct: f64 },
}

impl Reading {
    pub fn sensor_id(&self) -> SensorId {
        match self {
            Reading::Light { .. } => SensorId::Light,
            Reading::Ambient { .. } => SensorId::Ambient,
        }
    }
}

/// An instant as seen by a [`crate::clock::Clock`].
///
/// `since_start` drives due-time arithmetic and never goes backwards;
/// `wall` is what sinks record. Both halves come from the same `now()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub since_start: Duration,
    pub wall: DateTime<Utc>,
}

impl Timestamp {
    /// Monotonic time elapsed since `earlier`, zero if `earlier` is later.
    pub fn elapsed_since(&self, earlier: &Timestamp) -> Duration {
        self.since_start.saturating_sub(earlier.since_start)
    }

    /// Wall-clock nanoseconds since the Unix epoch, as stored by time-series sinks.
    pub fn unix_nanos(&self) -> Option<i64> {
        self.wall.timestamp_nanos_opt()
    }
}

/// A reading stamped once at capture time. Every sink receives the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub reading: Reading,
    pub captured_at: Timestamp,
}

impl Sample {
    pub fn sensor_id(&self) -> SensorId {
        self.reading.sensor_id()
    }
}
