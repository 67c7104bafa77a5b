//! Decides what to do with each message seen under `aero/#`
//!
//! Kept free of I/O: the event loop applies the returned [`Action`].

use aero_monitor::sinks::Point;

pub const SUBSCRIPTION: &str = "aero/#";
pub const STATUS_TOPIC: &str = "aero/status";
pub const LAST_MIST_TOPIC: &str = "aero/lastMistTime";
/// Where the controller picks its mist time back up after reconnecting.
pub const CONTROLLER_MIST_TOPIC: &str = "aeroPi/lastMistTime";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BridgeState {
    pub last_mist_time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send a message back to the controller.
    Publish { topic: &'static str, payload: String },
    /// Store a new last mist time.
    Remember(i64),
    /// Write one point (timestamp added at write time).
    Record(Point),
    /// Payload could not be interpreted for a handled topic.
    Malformed { topic: String, reason: String },
    Ignore,
}

pub fn route(topic: &str, payload: &[u8], state: &BridgeState) -> Action {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();

    match topic {
        STATUS_TOPIC if text == "CONNECTED" => Action::Publish {
            topic: CONTROLLER_MIST_TOPIC,
            payload: state.last_mist_time.to_string(),
        },
        STATUS_TOPIC => Action::Ignore,
        LAST_MIST_TOPIC => match text.parse::<i64>() {
            Ok(value) => Action::Remember(value),
            Err(e) => malformed(topic, e),
        },
        _ => record(topic, text),
    }
}

fn record(topic: &str, text: &str) -> Action {
    let measurement = topic.rsplit('/').next().unwrap_or(topic);
    match measurement {
        "pump" => {
            let on = i64::from(text == "on");
            Action::Record(Point::new(measurement).int_field("value", on))
        }
        "pressure" => match text.parse::<f64>() {
            Ok(value) => Action::Record(Point::new(measurement).field("value", value)),
            Err(e) => malformed(topic, e),
        },
        "mistersOn" => match text.parse::<i64>() {
            Ok(value) => Action::Record(Point::new(measurement).int_field("value", value)),
            Err(e) => malformed(topic, e),
        },
        _ => Action::Ignore,
    }
}

fn malformed(topic: &str, reason: impl ToString) -> Action {
    Action::Malformed { topic: topic.to_string(), reason: reason.to_string() }
}

impl BridgeState {
    /// Applies state changes; returns the action for the caller to carry out.
    pub fn apply(&mut self, action: Action) -> Action {
        if let Action::Remember(value) = action {
            self.last_mist_time = value;
        }
        action
    }
}
