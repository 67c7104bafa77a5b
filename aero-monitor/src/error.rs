//! Error taxonomy shared by the scheduler, sensor ports and sinks

use crate::model::SensorId;
use thiserror::Error;

/// Bad registration or configuration. Surfaced before the loop starts.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sensor {0} has a zero read interval")]
    ZeroInterval(SensorId),
    #[error("sensor {0} is already registered")]
    DuplicateSensor(SensorId),
    #[error("no sensors registered")]
    NoSensors,
    #[error("no reading sinks enabled")]
    NoSinks,
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Whether a failed read is worth retrying on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient, e.g. checksum mismatch or RC timeout.
    Recoverable,
    /// The sensor is unusable for the rest of the process lifetime.
    Fatal,
}

/// Failure returned by a sensor port's `read()`.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind:?} read failure: {message}")]
pub struct ReadFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ReadFailure {
    pub fn recoverable(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Recoverable, message: message.into() }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Fatal, message: message.into() }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == FailureKind::Fatal
    }
}

/// Emission to one sink failed. Logged, never retried.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("timestamp out of range for nanosecond precision")]
    TimestampOutOfRange,
}

/// Terminal outcome of `Scheduler::run`.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("all sensors disabled; last fatal error from {sensor}: {failure}")]
    AllSensorsDisabled { sensor: SensorId, failure: ReadFailure },
}
