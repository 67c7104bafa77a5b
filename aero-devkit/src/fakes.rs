/*!
Fakes for the scheduler's collaborators

Every fake hands out cheap clones sharing state, so a test keeps a handle
while the scheduler owns the boxed original.
*/

use aero_monitor::sensors::light::{DigitalLine, LineError};
use aero_monitor::sinks::LineTransport;
use aero_monitor::{Clock, ReadFailure, Reading, ReadingSink, Sample, SensorPort, SinkError, Timestamp};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct FakeClock {
    since_start: Arc<Mutex<Duration>>,
    origin: DateTime<Utc>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            since_start: Arc::new(Mutex::new(Duration::ZERO)),
            origin: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    pub fn set(&self, since_start: Duration) {
        *self.since_start.lock().unwrap() = since_start;
    }

    pub fn set_secs(&self, secs: u64) {
        self.set(Duration::from_secs(secs));
    }

    pub fn advance(&self, by: Duration) {
        *self.since_start.lock().unwrap() += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.since_start.lock().unwrap()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Timestamp {
        let since_start = self.elapsed();
        let offset = chrono::Duration::from_std(since_start).unwrap_or_else(|_| chrono::Duration::zero());
        Timestamp { since_start, wall: self.origin + offset }
    }
}

/// Shared view of a [`ScriptedPort`]'s activity.
#[derive(Clone, Default)]
pub struct PortProbe {
    read_times: Arc<Mutex<Vec<Duration>>>,
    releases: Arc<Mutex<u32>>,
}

impl PortProbe {
    pub fn reads(&self) -> usize {
        self.read_times.lock().unwrap().len()
    }

    /// Clock offsets at which `read()` was called.
    pub fn read_secs(&self) -> Vec<u64> {
        self.read_times.lock().unwrap().iter().map(|d| d.as_secs()).collect()
    }

    pub fn releases(&self) -> u32 {
        *self.releases.lock().unwrap()
    }
}

/// Sensor port replaying scripted outcomes, then repeating a fallback.
pub struct ScriptedPort {
    clock: FakeClock,
    script: VecDeque<Result<Reading, ReadFailure>>,
    then: Result<Reading, ReadFailure>,
    probe: PortProbe,
}

impl ScriptedPort {
    pub fn always(clock: &FakeClock, reading: Reading) -> Self {
        Self::scripted(clock, Vec::new(), Ok(reading))
    }

    pub fn scripted(
        clock: &FakeClock,
        script: Vec<Result<Reading, ReadFailure>>,
        then: Result<Reading, ReadFailure>,
    ) -> Self {
        Self { clock: clock.clone(), script: script.into(), then, probe: PortProbe::default() }
    }

    pub fn probe(&self) -> PortProbe {
        self.probe.clone()
    }
}

impl SensorPort for ScriptedPort {
    fn read(&mut self) -> Result<Reading, ReadFailure> {
        self.probe.read_times.lock().unwrap().push(self.clock.elapsed());
        self.script.pop_front().unwrap_or_else(|| self.then.clone())
    }

    fn release(&mut self) {
        *self.probe.releases.lock().unwrap() += 1;
    }
}

/// Sink keeping every sample it receives.
#[derive(Clone)]
pub struct RecordingSink {
    name: String,
    samples: Arc<Mutex<Vec<Sample>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), samples: Arc::default(), fail: false }
    }

    /// Records samples but reports every emission as failed.
    pub fn failing(name: &str) -> Self {
        Self { fail: true, ..Self::new(name) }
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().clone()
    }

    pub fn boxed(&self) -> Box<dyn ReadingSink> {
        Box::new(self.clone())
    }
}

impl ReadingSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn emit(&mut self, sample: &Sample) -> Result<(), SinkError> {
        self.samples.lock().unwrap().push(*sample);
        if self.fail {
            return Err(SinkError::Transport(format!("{} is down", self.name)));
        }
        Ok(())
    }
}

/// Line-protocol transport keeping every body written.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    lines: Arc<Mutex<Vec<String>>>,
    reject_status: Option<u16>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(status: u16) -> Self {
        Self { reject_status: Some(status), ..Self::default() }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LineTransport for RecordingTransport {
    fn write(&self, body: &str) -> Result<(), SinkError> {
        if let Some(status) = self.reject_status {
            return Err(SinkError::Rejected { status, body: "rejected by mock".into() });
        }
        self.lines.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

/// RC line that charges after `charge` on the fake clock; each poll costs `step`.
pub struct ChargingLine {
    clock: FakeClock,
    charge: Option<Duration>,
    step: Duration,
}

impl ChargingLine {
    pub fn new(clock: &FakeClock, charge: Duration, step: Duration) -> Self {
        Self { clock: clock.clone(), charge: Some(charge), step }
    }

    /// A line that never goes high, e.g. a disconnected capacitor.
    pub fn stuck_low(clock: &FakeClock, step: Duration) -> Self {
        Self { clock: clock.clone(), charge: None, step }
    }
}

impl DigitalLine for ChargingLine {
    fn drive_low(&mut self) -> Result<(), LineError> {
        Ok(())
    }

    fn release_to_input(&mut self) -> Result<(), LineError> {
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, LineError> {
        self.clock.advance(self.step);
        Ok(self.charge.map_or(false, |charge| self.clock.elapsed() >= charge))
    }
}
