//! Laser break-beam sensor across the dispensing chute.
//!
//! The receiver output reads HIGH while a pill blocks the beam. The emitter
//! is a plain output driven HIGH for as long as the sensor exists.

use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::traits::BeamSensor;

/// Beam sensor over any `embedded-hal` 1.0 pins.
///
/// # Example
///
/// ```ignore
/// use esp_idf_hal::gpio::PinDriver;
/// use rs_dispenser::hal::esp32::Esp32Beam;
///
/// let rx = PinDriver::input(peripherals.pins.gpio22)?;
/// let tx = PinDriver::output(peripherals.pins.gpio23)?;
/// let beam = Esp32Beam::new(rx, tx)?;
/// ```
pub struct Esp32Beam<RX, TX> {
    receiver: RX,
    _emitter: TX,
    last: bool,
}

impl<RX, TX> Esp32Beam<RX, TX>
where
    RX: InputPin,
    TX: OutputPin,
{
    /// Switch the emitter on and take the receiver.
    pub fn new(receiver: RX, mut emitter: TX) -> anyhow::Result<Self> {
        emitter
            .set_high()
            .map_err(|e| anyhow::anyhow!("beam emitter: {e:?}"))?;
        Ok(Self {
            receiver,
            _emitter: emitter,
            last: false,
        })
    }
}

impl<RX, TX> BeamSensor for Esp32Beam<RX, TX>
where
    RX: InputPin,
    TX: OutputPin,
{
    fn is_blocked(&mut self) -> bool {
        // A failed read repeats the last sample so no edge is invented.
        match self.receiver.is_high() {
            Ok(high) => self.last = high,
            Err(e) => warn!("beam read failed: {e:?}"),
        }
        self.last
    }
}
