//! DHT11 enclosure thermometer on a single-wire data pin.
//!
//! The data line is driven open-drain and needs a pull-up (most DHT11
//! breakout boards carry one). The sensor needs at least a second between
//! reads, far below the heartbeat rate. A failed or implausible read is
//! reported as `None`.

use dht_sensor::{dht11, DhtReading};
use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{InputOutput, InputPin, OutputPin, PinDriver};
use esp_idf_hal::peripheral::Peripheral;
use log::warn;

use crate::traits::TemperatureSensor;

/// DHT11 temperature sensor.
///
/// # Example
///
/// ```ignore
/// use rs_dispenser::hal::esp32::Esp32Dht11;
///
/// let mut thermometer = Esp32Dht11::new(peripherals.pins.gpio4)?;
/// ```
pub struct Esp32Dht11<'d, P: InputPin + OutputPin> {
    pin: PinDriver<'d, P, InputOutput>,
    delay: Ets,
}

impl<'d, P: InputPin + OutputPin> Esp32Dht11<'d, P> {
    /// DHT11 rated range
    const MIN_C: f32 = 0.0;
    const MAX_C: f32 = 50.0;

    /// Takes the data pin and releases the line high.
    pub fn new(pin: impl Peripheral<P = P> + 'd) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_high()?;
        Ok(Self { pin, delay: Ets })
    }
}

impl<P: InputPin + OutputPin> TemperatureSensor for Esp32Dht11<'_, P> {
    fn read_celsius(&mut self) -> Option<f32> {
        let reading = match dht11::Reading::read(&mut self.delay, &mut self.pin) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("DHT11 read failed: {e:?}");
                return None;
            }
        };
        let celsius = f32::from(reading.temperature);
        (Self::MIN_C..=Self::MAX_C)
            .contains(&celsius)
            .then_some(celsius)
    }
}
