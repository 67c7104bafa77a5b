//! Sensor ports consumed by the scheduler
//!
//! Each physical sensor sits behind a [`SensorPort`]:
//! - `light`: RC charge timing on a digital line
//! - `ambient`: DHT11 temperature/humidity through a driver capability
//! - `gpio`: Raspberry Pi line backing the light sensor (Linux only)

pub mod ambient;
#[cfg(target_os = "linux")]
pub mod gpio;
pub mod light;

use crate::error::ReadFailure;
use crate::model::Reading;

pub use ambient::{AmbientDriver, AmbientPort, DriverError, IioDht11};
pub use light::{DigitalLine, LineError, RcTiming, RcTimingLight};

/// Blocking read of one sensor.
pub trait SensorPort: Send {
    fn read(&mut self) -> Result<Reading, ReadFailure>;

    /// Return any held hardware to a safe state. Called once when the sensor
    /// is disabled and when the scheduler loop exits.
    fn release(&mut self) {}
}

impl<P: SensorPort + ?Sized> SensorPort for Box<P> {
    fn read(&mut self) -> Result<Reading, ReadFailure> {
        (**self).read()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
