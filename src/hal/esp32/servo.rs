//! Hobby servo on an LEDC channel, used for the gate and the turntable.

use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;

use crate::traits::ServoOutput;

/// 50 Hz servo with a 500-2400 us pulse range over 0-180 degrees.
///
/// Each servo owns its LEDC timer; the feed motor's 20 kHz timer cannot be
/// shared.
pub struct Esp32Servo<'d> {
    pwm: LedcDriver<'d>,
    max_duty: u32,
    angle: Option<u8>,
}

impl<'d> Esp32Servo<'d> {
    const FREQ_HZ: u32 = 50;
    const PERIOD_US: u32 = 20_000;
    const MIN_PULSE_US: u32 = 500;
    const MAX_PULSE_US: u32 = 2400;

    /// Creates the servo without moving it.
    pub fn new<T, TI, C, CI, P, PI>(pin: P, timer: T, channel: C) -> anyhow::Result<Self>
    where
        TI: esp_idf_hal::ledc::LedcTimer + 'd,
        T: Peripheral<P = TI> + 'd,
        CI: esp_idf_hal::ledc::LedcChannel<SpeedMode = TI::SpeedMode> + 'd,
        C: Peripheral<P = CI> + 'd,
        PI: OutputPin + 'd,
        P: Peripheral<P = PI> + 'd,
    {
        let timer_config = TimerConfig::default()
            .frequency(Self::FREQ_HZ.Hz())
            .resolution(Resolution::Bits14);
        let timer_driver = LedcTimerDriver::new(timer, &timer_config)?;
        let pwm = LedcDriver::new(channel, &timer_driver, pin)?;
        let max_duty = pwm.get_max_duty();
        Ok(Self {
            pwm,
            max_duty,
            angle: None,
        })
    }

    fn duty_for(&self, angle: u8) -> u32 {
        let span = Self::MAX_PULSE_US - Self::MIN_PULSE_US;
        let pulse = Self::MIN_PULSE_US + u32::from(angle.min(180)) * span / 180;
        pulse * self.max_duty / Self::PERIOD_US
    }

    /// Last commanded angle.
    pub fn angle(&self) -> Option<u8> {
        self.angle
    }
}

impl ServoOutput for Esp32Servo<'_> {
    type Error = esp_idf_hal::sys::EspError;

    fn set_angle(&mut self, angle: u8) -> Result<(), Self::Error> {
        let duty = self.duty_for(angle);
        self.pwm.set_duty(duty)?;
        self.angle = Some(angle.min(180));
        Ok(())
    }
}
