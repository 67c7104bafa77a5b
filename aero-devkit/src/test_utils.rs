/*!
Test harness for the scheduler

Owns a scheduler wired to a fake clock and steps it through whole seconds,
the way the daemon's loop would see time pass.
*/

use crate::fakes::{FakeClock, PortProbe, ScriptedPort};
use aero_monitor::{ConfigError, ReadingSink, Scheduler, ScheduleState, SensorId, SensorSpec, TickEvent};
use std::ops::Range;
use std::time::Duration;

pub struct TestHarness {
    pub clock: FakeClock,
    pub scheduler: Scheduler,
}

impl TestHarness {
    pub fn new() -> Self {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        let clock = FakeClock::new();
        let scheduler = Scheduler::new(clock.clone()).with_idle(Duration::from_millis(1));
        Self { clock, scheduler }
    }

    /// Register a scripted port and return a probe on its reads.
    pub fn register(
        &mut self,
        id: SensorId,
        interval_secs: u64,
        port: ScriptedPort,
        sinks: Vec<Box<dyn ReadingSink>>,
    ) -> Result<PortProbe, ConfigError> {
        let probe = port.probe();
        self.scheduler.register(SensorSpec::new(id, Duration::from_secs(interval_secs), port), sinks)?;
        Ok(probe)
    }

    /// Move the clock to `secs` and run one tick.
    pub fn tick_at(&mut self, secs: u64) -> Vec<TickEvent> {
        self.clock.set_secs(secs);
        self.scheduler.tick()
    }

    /// One tick per whole second in `range`.
    pub fn tick_seconds(&mut self, range: Range<u64>) -> Vec<TickEvent> {
        range.flat_map(|secs| self.tick_at(secs)).collect()
    }

    pub fn state(&self, id: SensorId) -> ScheduleState {
        self.scheduler.state(id).cloned().unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
