/*!
# Aero DevKit - test doubles for the monitor

Lets scheduler and sink behaviour be exercised without hardware or brokers:
- Mock MQTT client recording every publish
- Fake clock driven by hand
- Scripted sensor ports and recording sinks/transports
- `TestHarness` ticking a scheduler second by second
*/

pub mod fakes;
pub mod mqtt_stub;
pub mod test_utils;

pub use fakes::{ChargingLine, FakeClock, PortProbe, RecordingSink, RecordingTransport, ScriptedPort};
pub use mqtt_stub::{MockMessage, MockMqttClient};
pub use test_utils::TestHarness;
