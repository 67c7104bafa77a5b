//! Light level from the charge time of an RC circuit
//!
//! The capacitor is discharged by driving the line low, then the line is
//! switched to input and polled until the capacitor charges past the logic
//! threshold. A photoresistor in the charge path makes darker light slower.
//! Values only compare against each other; they carry no physical unit.

use super::SensorPort;
use crate::clock::Clock;
use crate::error::ReadFailure;
use crate::model::Reading;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("digital line error: {0}")]
pub struct LineError(pub String);

/// A single digital I/O line that can be driven low or sampled.
pub trait DigitalLine: Send {
    fn drive_low(&mut self) -> Result<(), LineError>;
    fn release_to_input(&mut self) -> Result<(), LineError>;
    fn is_high(&mut self) -> Result<bool, LineError>;
}

/// Timing parameters for one RC measurement
#[derive(Debug, Clone, Copy)]
pub struct RcTiming {
    /// How long the line is held low to empty the capacitor.
    pub discharge: Duration,
    /// Upper bound on the charge wait before the read is abandoned.
    pub timeout: Duration,
    /// Multiplier from charge seconds to intensity units.
    pub scale: f64,
}

impl Default for RcTiming {
    fn default() -> Self {
        Self {
            discharge: Duration::from_millis(100),
            timeout: Duration::from_secs(2),
            scale: 1000.0,
        }
    }
}

/// Maps a charge time to intensity. Strictly increasing in `elapsed`.
pub fn intensity_from_charge(elapsed: Duration, scale: f64) -> f64 {
    elapsed.as_secs_f64() * scale
}

pub struct RcTimingLight<L, C> {
    line: L,
    clock: C,
    timing: RcTiming,
}

impl<L: DigitalLine, C: Clock> RcTimingLight<L, C> {
    pub fn new(line: L, clock: C, timing: RcTiming) -> Self {
        Self { line, clock, timing }
    }

    fn measure(&mut self) -> Result<Reading, ReadFailure> {
        self.line.drive_low().map_err(|e| ReadFailure::fatal(e.to_string()))?;
        if !self.timing.discharge.is_zero() {
            std::thread::sleep(self.timing.discharge);
        }
        self.line.release_to_input().map_err(|e| ReadFailure::fatal(e.to_string()))?;

        let start = self.clock.now();
        loop {
            let high = self.line.is_high().map_err(|e| ReadFailure::fatal(e.to_string()))?;
            let elapsed = self.clock.now().elapsed_since(&start);
            if high {
                debug!(charge_us = elapsed.as_micros() as u64, "RC line went high");
                return Ok(Reading::Light {
                    intensity: intensity_from_charge(elapsed, self.timing.scale),
                });
            }
            if elapsed >= self.timing.timeout {
                return Err(ReadFailure::recoverable(format!(
                    "line stayed low for {:?}",
                    self.timing.timeout
                )));
            }
            std::hint::spin_loop();
        }
    }
}

impl<L: DigitalLine, C: Clock> SensorPort for RcTimingLight<L, C> {
    fn read(&mut self) -> Result<Reading, ReadFailure> {
        self.measure()
    }

    fn release(&mut self) {
        if let Err(e) = self.line.release_to_input() {
            warn!(error = %e, "failed to return light line to input");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Timestamp;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct StepClock(Arc<Mutex<Duration>>);

    impl Clock for StepClock {
        fn now(&self) -> Timestamp {
            Timestamp { since_start: *self.0.lock().unwrap(), wall: Utc::now() }
        }
    }

    /// Goes high once the shared clock passes `charge`; every poll costs `step`.
    struct ChargingLine {
        clock: StepClock,
        charge: Option<Duration>,
        step: Duration,
        inputs: usize,
    }

    impl DigitalLine for ChargingLine {
        fn drive_low(&mut self) -> Result<(), LineError> {
            Ok(())
        }

        fn release_to_input(&mut self) -> Result<(), LineError> {
            self.inputs += 1;
            Ok(())
        }

        fn is_high(&mut self) -> Result<bool, LineError> {
            let mut now = self.clock.0.lock().unwrap();
            *now += self.step;
            Ok(self.charge.map_or(false, |c| *now >= c))
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Stage {
        DriveLow,
        Release,
        Sample,
    }

    /// Line whose pin errors at one stage of the measurement.
    struct BrokenLine(Stage);

    impl BrokenLine {
        fn fail_at(&self, stage: Stage) -> Result<(), LineError> {
            if self.0 == stage {
                return Err(LineError("pin unexported".into()));
            }
            Ok(())
        }
    }

    impl DigitalLine for BrokenLine {
        fn drive_low(&mut self) -> Result<(), LineError> {
            self.fail_at(Stage::DriveLow)
        }

        fn release_to_input(&mut self) -> Result<(), LineError> {
            self.fail_at(Stage::Release)
        }

        fn is_high(&mut self) -> Result<bool, LineError> {
            self.fail_at(Stage::Sample).map(|()| false)
        }
    }

    fn light(charge: Option<Duration>) -> RcTimingLight<ChargingLine, StepClock> {
        let clock = StepClock(Arc::new(Mutex::new(Duration::ZERO)));
        let line = ChargingLine {
            clock: clock.clone(),
            charge,
            step: Duration::from_millis(1),
            inputs: 0,
        };
        let timing = RcTiming { discharge: Duration::ZERO, ..RcTiming::default() };
        RcTimingLight::new(line, clock, timing)
    }

    fn intensity(reading: Reading) -> f64 {
        match reading {
            Reading::Light { intensity } => intensity,
            other => panic!("unexpected reading {other:?}"),
        }
    }

    #[test]
    fn test_darker_reads_higher() {
        let bright = intensity(light(Some(Duration::from_millis(20))).read().unwrap());
        let dark = intensity(light(Some(Duration::from_millis(200))).read().unwrap());
        assert!(dark > bright);
        assert_eq!(bright, intensity(light(Some(Duration::from_millis(20))).read().unwrap()));
    }

    #[test]
    fn test_timeout_is_recoverable() {
        let failure = light(None).read().unwrap_err();
        assert!(!failure.is_fatal());
    }

    #[test]
    fn test_line_errors_are_fatal() {
        for stage in [Stage::DriveLow, Stage::Release, Stage::Sample] {
            let clock = StepClock(Arc::new(Mutex::new(Duration::ZERO)));
            let timing = RcTiming { discharge: Duration::ZERO, ..RcTiming::default() };
            let mut port = RcTimingLight::new(BrokenLine(stage), clock, timing);

            let failure = port.read().unwrap_err();
            assert!(failure.is_fatal());
            assert!(failure.message.contains("pin unexported"));
        }
    }

    #[test]
    fn test_release_returns_line_to_input() {
        let mut port = light(Some(Duration::from_millis(5)));
        port.release();
        assert_eq!(port.line.inputs, 1);
    }

    #[test]
    fn test_intensity_scale() {
        assert_eq!(intensity_from_charge(Duration::from_millis(250), 1000.0), 250.0);
    }
}
