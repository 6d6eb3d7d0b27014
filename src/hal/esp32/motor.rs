//! BTS7960 feed motor driver on ESP32 LEDC PWM.
//!
//! The feeder only ever turns one way:
//! - L_PWM = level, R_PWM = 0 while feeding
//! - both at 0 when stopped
//!
//! R_EN and L_EN are either jumpered to 3.3V or handed to [`Esp32FeedMotor::enable`].

use esp_idf_hal::gpio::{Output, OutputPin, PinDriver};
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use log::info;

use crate::traits::FeedMotor;

/// BTS7960 feed motor.
///
/// PWM runs at 20 kHz with 10-bit resolution. Levels are on the 0-255
/// scale the dispenser config uses and are rescaled to the duty range.
///
/// # Example
///
/// ```ignore
/// use rs_dispenser::hal::esp32::Esp32FeedMotor;
/// use rs_dispenser::traits::FeedMotor;
///
/// let mut motor = Esp32FeedMotor::new(
///     peripherals.pins.gpio26,
///     peripherals.pins.gpio25,
///     peripherals.ledc.timer0,
///     peripherals.ledc.channel0,
///     peripherals.ledc.channel1,
/// )?;
/// motor.set_level(60)?;
/// ```
pub struct Esp32FeedMotor<'d> {
    l_pwm: LedcDriver<'d>,
    r_pwm: LedcDriver<'d>,
    level: u8,
}

impl<'d> Esp32FeedMotor<'d> {
    /// 20 kHz keeps the motor whine out of the audible range
    const PWM_FREQ_HZ: u32 = 20_000;

    const PWM_RESOLUTION: Resolution = Resolution::Bits10;

    /// Maximum duty value for 10-bit resolution
    const MAX_DUTY: u32 = 1023;

    /// Creates the driver with the motor stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if PWM initialization fails.
    pub fn new<T, TI, LC, LCI, RC, RCI, LP, LPI, RP, RPI>(
        l_pwm_pin: LP,
        r_pwm_pin: RP,
        timer: T,
        l_channel: LC,
        r_channel: RC,
    ) -> anyhow::Result<Self>
    where
        TI: esp_idf_hal::ledc::LedcTimer + 'd,
        T: Peripheral<P = TI> + 'd,
        LCI: esp_idf_hal::ledc::LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        LC: Peripheral<P = LCI> + 'd,
        RCI: esp_idf_hal::ledc::LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        RC: Peripheral<P = RCI> + 'd,
        LPI: OutputPin + 'd,
        LP: Peripheral<P = LPI> + 'd,
        RPI: OutputPin + 'd,
        RP: Peripheral<P = RPI> + 'd,
    {
        let timer_config = TimerConfig::default()
            .frequency(Self::PWM_FREQ_HZ.Hz())
            .resolution(Self::PWM_RESOLUTION);
        let timer_driver = LedcTimerDriver::new(timer, &timer_config)?;

        let l_pwm = LedcDriver::new(l_channel, &timer_driver, l_pwm_pin)?;
        let r_pwm = LedcDriver::new(r_channel, &timer_driver, r_pwm_pin)?;

        let mut motor = Self {
            l_pwm,
            r_pwm,
            level: 0,
        };
        motor.apply_pwm()?;
        Ok(motor)
    }

    /// Drive both half-bridge enables high.
    pub fn enable<R, L>(
        r_en: &mut PinDriver<'_, R, Output>,
        l_en: &mut PinDriver<'_, L, Output>,
    ) -> anyhow::Result<()>
    where
        R: OutputPin,
        L: OutputPin,
    {
        r_en.set_high()?;
        l_en.set_high()?;
        info!("feed motor driver enabled");
        Ok(())
    }

    fn apply_pwm(&mut self) -> Result<(), esp_idf_hal::sys::EspError> {
        let duty = u32::from(self.level) * Self::MAX_DUTY / u32::from(u8::MAX);
        self.r_pwm.set_duty(0)?;
        self.l_pwm.set_duty(duty)?;
        Ok(())
    }

    /// Last level written.
    #[inline]
    pub fn level(&self) -> u8 {
        self.level
    }
}

impl FeedMotor for Esp32FeedMotor<'_> {
    type Error = esp_idf_hal::sys::EspError;

    fn set_level(&mut self, level: u8) -> Result<(), Self::Error> {
        self.level = level;
        self.apply_pwm()
    }
}
