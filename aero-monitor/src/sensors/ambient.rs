//! DHT11 ambient temperature and humidity
//!
//! The driver reports Celsius; conversion to Fahrenheit happens here so every
//! sink sees the same unit.

use super::SensorPort;
use crate::error::{FailureKind, ReadFailure};
use crate::model::Reading;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

// Linux errno values surfaced by the dht11 IIO driver and sysfs
const EIO: i32 = 5;
const EAGAIN: i32 = 11;
const ENODEV: i32 = 19;
const ENOTDIR: i32 = 20;
const EISDIR: i32 = 21;
const ETIMEDOUT: i32 = 110;

/// Errors reported by a DHT-style driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("timing error: {0}")]
    Timing(String),
    #[error("checksum did not validate")]
    Checksum,
    #[error("device absent: {0}")]
    Absent(String),
    #[error("driver failure: {0}")]
    Internal(String),
}

impl DriverError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DriverError::Timing(_) | DriverError::Checksum => FailureKind::Recoverable,
            DriverError::Absent(_) | DriverError::Internal(_) => FailureKind::Fatal,
        }
    }
}

impl From<DriverError> for ReadFailure {
    fn from(err: DriverError) -> Self {
        ReadFailure { kind: err.kind(), message: err.to_string() }
    }
}

/// Raw access to a humidity/temperature device.
pub trait AmbientDriver: Send {
    /// Returns `(temperature_c, humidity_pct)`.
    fn read_raw(&mut self) -> Result<(f64, f64), DriverError>;

    fn close(&mut self) {}
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub struct AmbientPort<D> {
    driver: D,
}

impl<D: AmbientDriver> AmbientPort<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }
}

impl<D: AmbientDriver> SensorPort for AmbientPort<D> {
    fn read(&mut self) -> Result<Reading, ReadFailure> {
        let (temperature_c, humidity_pct) = self.driver.read_raw()?;
        Ok(Reading::Ambient {
            temperature_f: celsius_to_fahrenheit(temperature_c),
            humidity_pct,
        })
    }

    fn release(&mut self) {
        self.driver.close();
    }
}

/// DHT11 exposed by the Linux `dht11` IIO driver.
///
/// Channels are plain text in milli-units: `in_temp_input` (m°C) and
/// `in_humidityrelative_input` (m%).
#[derive(Debug, Clone)]
pub struct IioDht11 {
    device: PathBuf,
}

impl IioDht11 {
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self { device: device.into() }
    }

    fn read_channel(&self, channel: &str) -> Result<f64, DriverError> {
        let path = self.device.join(channel);
        let text = fs::read_to_string(&path).map_err(|e| classify_io(&path, e))?;
        let milli: i64 = text
            .trim()
            .parse()
            .map_err(|e| DriverError::Internal(format!("{}: {e}", path.display())))?;
        Ok(milli as f64 / 1000.0)
    }
}

/// Bad-checksum and missed-edge reads come back as EIO, ETIMEDOUT or EAGAIN
/// and are worth retrying. A path that is not a live device is absent.
fn classify_io(path: &Path, err: io::Error) -> DriverError {
    let detail = format!("{}: {err}", path.display());
    match (err.kind(), err.raw_os_error()) {
        (io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied, _) => DriverError::Absent(detail),
        (_, Some(ENODEV | ENOTDIR | EISDIR)) => DriverError::Absent(detail),
        (_, Some(EIO | ETIMEDOUT | EAGAIN)) => DriverError::Timing(detail),
        (io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock, _) => DriverError::Timing(detail),
        _ => DriverError::Internal(detail),
    }
}

impl AmbientDriver for IioDht11 {
    fn read_raw(&mut self) -> Result<(f64, f64), DriverError> {
        let temperature_c = self.read_channel("in_temp_input")?;
        let humidity_pct = self.read_channel("in_humidityrelative_input")?;
        debug!(temperature_c, humidity_pct, "dht11 raw values");
        Ok((temperature_c, humidity_pct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum FixedDriver {
        Values(f64, f64),
        Checksum,
        Absent,
    }

    impl AmbientDriver for FixedDriver {
        fn read_raw(&mut self) -> Result<(f64, f64), DriverError> {
            match self {
                FixedDriver::Values(c, h) => Ok((*c, *h)),
                FixedDriver::Checksum => Err(DriverError::Checksum),
                FixedDriver::Absent => Err(DriverError::Absent("gone".into())),
            }
        }
    }

    #[test]
    fn test_conversion_fixed_points() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }

    #[test]
    fn test_port_converts_before_returning() {
        let mut port = AmbientPort::new(FixedDriver::Values(25.0, 55.0));
        assert_eq!(
            port.read().unwrap(),
            Reading::Ambient { temperature_f: 77.0, humidity_pct: 55.0 }
        );
    }

    #[test]
    fn test_failure_classes() {
        let mut checksum = AmbientPort::new(FixedDriver::Checksum);
        assert_eq!(checksum.read().unwrap_err().kind, FailureKind::Recoverable);

        let mut absent = AmbientPort::new(FixedDriver::Absent);
        assert_eq!(absent.read().unwrap_err().kind, FailureKind::Fatal);
    }

    #[test]
    fn test_iio_reads_milli_units() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in_temp_input"), "21500\n").unwrap();
        fs::write(dir.path().join("in_humidityrelative_input"), "45000\n").unwrap();

        let mut driver = IioDht11::new(dir.path());
        assert_eq!(driver.read_raw().unwrap(), (21.5, 45.0));
    }

    #[test]
    fn test_iio_missing_device_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = IioDht11::new(dir.path().join("iio:device9"));
        assert_eq!(driver.read_raw().unwrap_err().kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_iio_device_path_is_a_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("iio:device0");
        fs::write(&device, "").unwrap();

        let err = IioDht11::new(&device).read_raw().unwrap_err();
        assert!(matches!(err, DriverError::Absent(_)), "{err}");
        assert_eq!(err.kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_errno_classification() {
        let path = Path::new("/sys/bus/iio/devices/iio:device0/in_temp_input");
        let classify = |errno| classify_io(path, io::Error::from_raw_os_error(errno));

        assert!(matches!(classify(EIO), DriverError::Timing(_)));
        assert!(matches!(classify(ETIMEDOUT), DriverError::Timing(_)));
        assert!(matches!(classify(EAGAIN), DriverError::Timing(_)));
        assert!(matches!(classify(ENODEV), DriverError::Absent(_)));
        assert!(matches!(classify(ENOTDIR), DriverError::Absent(_)));
        assert!(matches!(classify(EISDIR), DriverError::Absent(_)));
        // ENOSPC: nothing a retry fixes
        assert!(matches!(classify(28), DriverError::Internal(_)));

        assert_eq!(classify(EIO).kind(), FailureKind::Recoverable);
        assert_eq!(classify(ENODEV).kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_iio_garbage_is_internal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in_temp_input"), "not a number").unwrap();
        let mut driver = IioDht11::new(dir.path());
        assert!(matches!(driver.read_raw(), Err(DriverError::Internal(_))));
    }
}
