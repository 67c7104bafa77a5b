//! Independent-interval polling scheduler
//!
//! One synchronous loop serves every registered sensor:
//! - a sensor is due when its interval has elapsed since its last success
//!   (never-read sensors are due immediately)
//! - due sensors are read in registration order, never concurrently
//! - a success is stamped once and delivered to each of its sinks in order
//! - a recoverable failure leaves the due-time alone, so the sensor is retried
//!   on the next tick
//! - a fatal failure disables that sensor only

use crate::clock::{Clock, StopSignal};
use crate::error::{ConfigError, MonitorError, ReadFailure};
use crate::model::{Sample, SensorId, Timestamp};
use crate::sensors::SensorPort;
use crate::sinks::ReadingSink;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_IDLE: Duration = Duration::from_millis(50);

/// A sensor to poll, fixed at startup.
pub struct SensorSpec {
    pub id: SensorId,
    pub interval: Duration,
    pub port: Box<dyn SensorPort>,
}

impl SensorSpec {
    pub fn new(id: SensorId, interval: Duration, port: impl SensorPort + 'static) -> Self {
        Self { id, interval, port: Box::new(port) }
    }
}

/// Per-sensor counters, logged when the loop stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorStats {
    /// Every read attempt, successful or not.
    pub reads: u64,
    pub recoverable_failures: u64,
    pub emissions: u64,
    pub sink_failures: u64,
}

/// Mutable schedule bookkeeping for one sensor. Only the scheduler writes it.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    pub sensor_id: SensorId,
    pub last_success: Option<Timestamp>,
    pub disabled: bool,
    pub stats: SensorStats,
}

impl ScheduleState {
    fn new(sensor_id: SensorId) -> Self {
        Self { sensor_id, last_success: None, disabled: false, stats: SensorStats::default() }
    }

    fn is_due(&self, now: &Timestamp, interval: Duration) -> bool {
        match &self.last_success {
            None => true,
            Some(last) => now.elapsed_since(last) >= interval,
        }
    }
}

/// What happened to one sensor during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    Emitted { sensor: SensorId, sample: Sample },
    Retrying { sensor: SensorId, failure: ReadFailure },
    Disabled { sensor: SensorId, failure: ReadFailure },
}

struct Entry {
    spec: SensorSpec,
    sinks: Vec<Box<dyn ReadingSink>>,
    state: ScheduleState,
}

pub struct Scheduler {
    clock: Box<dyn Clock>,
    idle: Duration,
    entries: Vec<Entry>,
}

impl Scheduler {
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self { clock: Box::new(clock), idle: DEFAULT_IDLE, entries: Vec::new() }
    }

    /// Sleep between ticks.
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    pub fn register(
        &mut self,
        spec: SensorSpec,
        sinks: Vec<Box<dyn ReadingSink>>,
    ) -> Result<(), ConfigError> {
        if spec.interval.is_zero() {
            return Err(ConfigError::ZeroInterval(spec.id));
        }
        if self.entries.iter().any(|e| e.spec.id == spec.id) {
            return Err(ConfigError::DuplicateSensor(spec.id));
        }
        info!(
            sensor = %spec.id,
            interval_secs = spec.interval.as_secs_f64(),
            sinks = sinks.len(),
            "sensor registered"
        );
        let state = ScheduleState::new(spec.id);
        self.entries.push(Entry { spec, sinks, state });
        Ok(())
    }

    pub fn state(&self, id: SensorId) -> Option<&ScheduleState> {
        self.entries.iter().find(|e| e.spec.id == id).map(|e| &e.state)
    }

    pub fn active_sensors(&self) -> usize {
        self.entries.iter().filter(|e| !e.state.disabled).count()
    }

    /// One pass over all sensors in registration order.
    pub fn tick(&mut self) -> Vec<TickEvent> {
        let mut events = Vec::new();
        for entry in self.entries.iter_mut() {
            if entry.state.disabled {
                continue;
            }
            let now = self.clock.now();
            if !entry.state.is_due(&now, entry.spec.interval) {
                continue;
            }

            let sensor = entry.spec.id;
            entry.state.stats.reads += 1;
            match entry.spec.port.read() {
                Ok(reading) => {
                    let sample = Sample { reading, captured_at: self.clock.now() };
                    entry.state.last_success = Some(sample.captured_at);
                    debug!(%sensor, ?reading, "sensor read");
                    deliver(sensor, &sample, &mut entry.sinks, &mut entry.state.stats);
                    events.push(TickEvent::Emitted { sensor, sample });
                }
                Err(failure) if failure.is_fatal() => {
                    error!(%sensor, kind = ?failure.kind, error = %failure.message, "sensor disabled");
                    entry.state.disabled = true;
                    entry.spec.port.release();
                    events.push(TickEvent::Disabled { sensor, failure });
                }
                Err(failure) => {
                    warn!(%sensor, kind = ?failure.kind, error = %failure.message, "read failed, retrying next tick");
                    entry.state.stats.recoverable_failures += 1;
                    events.push(TickEvent::Retrying { sensor, failure });
                }
            }
        }
        events
    }

    /// Tick until `stop` fires, then release every sensor port.
    ///
    /// Fails with `AllSensorsDisabled` once no sensor is left to poll.
    pub fn run(&mut self, stop: &StopSignal) -> Result<(), MonitorError> {
        if self.entries.is_empty() {
            return Err(ConfigError::NoSensors.into());
        }
        info!(sensors = self.entries.len(), idle_ms = self.idle.as_millis() as u64, "scheduler started");

        let mut outcome = Ok(());
        while !stop.is_triggered() {
            let events = self.tick();
            if self.active_sensors() == 0 {
                if let Some((sensor, failure)) = events.into_iter().rev().find_map(|event| match event {
                    TickEvent::Disabled { sensor, failure } => Some((sensor, failure)),
                    _ => None,
                }) {
                    outcome = Err(MonitorError::AllSensorsDisabled { sensor, failure });
                }
                break;
            }
            std::thread::sleep(self.idle);
        }

        self.release_all();
        outcome
    }

    fn release_all(&mut self) {
        for entry in self.entries.iter_mut() {
            if !entry.state.disabled {
                entry.spec.port.release();
            }
            let stats = &entry.state.stats;
            info!(
                sensor = %entry.spec.id,
                disabled = entry.state.disabled,
                reads = stats.reads,
                recoverable_failures = stats.recoverable_failures,
                emissions = stats.emissions,
                sink_failures = stats.sink_failures,
                "scheduler stopped"
            );
        }
    }
}

/// Hand one sample to every sink. A failing sink never blocks the rest.
fn deliver(
    sensor: SensorId,
    sample: &Sample,
    sinks: &mut [Box<dyn ReadingSink>],
    stats: &mut SensorStats,
) {
    for sink in sinks.iter_mut() {
        match sink.emit(sample) {
            Ok(()) => stats.emissions += 1,
            Err(e) => {
                stats.sink_failures += 1;
                warn!(%sensor, sink = sink.name(), error = %e, "emission failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::model::Reading;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct ManualClock(Arc<Mutex<Duration>>);

    impl ManualClock {
        fn set_secs(&self, secs: u64) {
            *self.0.lock().unwrap() = Duration::from_secs(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Timestamp {
            Timestamp { since_start: *self.0.lock().unwrap(), wall: Utc::now() }
        }
    }

    struct Script(Vec<Result<Reading, ReadFailure>>, Arc<Mutex<u32>>);

    impl SensorPort for Script {
        fn read(&mut self) -> Result<Reading, ReadFailure> {
            *self.1.lock().unwrap() += 1;
            if self.0.len() > 1 {
                self.0.remove(0)
            } else {
                self.0[0].clone()
            }
        }
    }

    struct FailingSink;

    impl ReadingSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn emit(&mut self, _sample: &Sample) -> Result<(), SinkError> {
            Err(SinkError::Transport("down".into()))
        }
    }

    struct CountingSink(Arc<Mutex<Vec<Sample>>>);

    impl ReadingSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        fn emit(&mut self, sample: &Sample) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(*sample);
            Ok(())
        }
    }

    fn light() -> Result<Reading, ReadFailure> {
        Ok(Reading::Light { intensity: 10.0 })
    }

    #[test]
    fn test_register_rejects_zero_interval_and_duplicates() {
        let mut scheduler = Scheduler::new(ManualClock::default());
        let calls = Arc::new(Mutex::new(0));
        let zero = SensorSpec::new(SensorId::Light, Duration::ZERO, Script(vec![light()], calls.clone()));
        assert_eq!(scheduler.register(zero, vec![]), Err(ConfigError::ZeroInterval(SensorId::Light)));

        let spec = SensorSpec::new(SensorId::Light, Duration::from_secs(1), Script(vec![light()], calls.clone()));
        scheduler.register(spec, vec![]).unwrap();
        let again = SensorSpec::new(SensorId::Light, Duration::from_secs(2), Script(vec![light()], calls));
        assert_eq!(scheduler.register(again, vec![]), Err(ConfigError::DuplicateSensor(SensorId::Light)));
    }

    #[test]
    fn test_sink_failure_does_not_block_other_sinks() {
        let clock = ManualClock::default();
        let mut scheduler = Scheduler::new(clock.clone());
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let spec = SensorSpec::new(SensorId::Light, Duration::from_secs(20), Script(vec![light()], Default::default()));
        scheduler
            .register(spec, vec![Box::new(FailingSink), Box::new(CountingSink(recorded.clone()))])
            .unwrap();

        scheduler.tick();
        assert_eq!(recorded.lock().unwrap().len(), 1);
        let state = scheduler.state(SensorId::Light).unwrap();
        assert!(state.last_success.is_some());
        assert_eq!(state.stats, SensorStats { reads: 1, recoverable_failures: 0, emissions: 1, sink_failures: 1 });
    }

    #[test]
    fn test_not_due_until_interval_elapsed() {
        let clock = ManualClock::default();
        let calls = Arc::new(Mutex::new(0));
        let mut scheduler = Scheduler::new(clock.clone());
        let spec = SensorSpec::new(SensorId::Ambient, Duration::from_secs(30), Script(vec![light()], calls.clone()));
        scheduler.register(spec, vec![]).unwrap();

        scheduler.tick();
        clock.set_secs(29);
        scheduler.tick();
        assert_eq!(*calls.lock().unwrap(), 1);
        clock.set_secs(30);
        scheduler.tick();
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_run_without_sensors_is_config_error() {
        let mut scheduler = Scheduler::new(ManualClock::default());
        let err = scheduler.run(&StopSignal::new()).unwrap_err();
        assert!(matches!(err, MonitorError::Config(ConfigError::NoSensors)));
    }
}
