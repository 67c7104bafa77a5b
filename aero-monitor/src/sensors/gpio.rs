//! Raspberry Pi GPIO line for the RC light sensor

use super::light::{DigitalLine, LineError};
use rppal::gpio::{Gpio, IoPin, Mode};

/// BCM-numbered pin switched between output (discharge) and input (sample).
///
/// rppal restores the pin's original mode when this is dropped.
pub struct GpioLine {
    pin: IoPin,
}

impl GpioLine {
    pub fn open(bcm_pin: u8) -> Result<Self, LineError> {
        let gpio = Gpio::new().map_err(|e| LineError(format!("gpio unavailable: {e}")))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| LineError(format!("bcm pin {bcm_pin}: {e}")))?
            .into_io(Mode::Input);
        Ok(Self { pin })
    }
}

impl DigitalLine for GpioLine {
    fn drive_low(&mut self) -> Result<(), LineError> {
        self.pin.set_low();
        self.pin.set_mode(Mode::Output);
        Ok(())
    }

    fn release_to_input(&mut self) -> Result<(), LineError> {
        self.pin.set_mode(Mode::Input);
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, LineError> {
        Ok(self.pin.is_high())
    }
}
