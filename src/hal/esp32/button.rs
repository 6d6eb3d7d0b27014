//! Provisioning reset button.

use esp_idf_hal::gpio::{Input, InputPin, OutputPin, PinDriver, Pull};
use esp_idf_hal::peripheral::Peripheral;

use crate::traits::ResetButton;

/// Active-low push button with the internal pull-up enabled.
pub struct Esp32Button<'d, P: InputPin> {
    pin: PinDriver<'d, P, Input>,
}

impl<'d, P> Esp32Button<'d, P>
where
    P: InputPin + OutputPin,
{
    /// Configure the pin as a pulled-up input.
    pub fn new(pin: impl Peripheral<P = P> + 'd) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        Ok(Self { pin })
    }
}

impl<P: InputPin> ResetButton for Esp32Button<'_, P> {
    fn is_pressed(&self) -> bool {
        self.pin.is_low()
    }
}
