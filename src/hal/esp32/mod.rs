//! ESP32 hardware abstraction layer for the pill dispenser.
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32 DevKit (Xtensa dual core, 4MB Flash)
//! - **Feed motor**: DC gear motor on a BTS7960 driver
//! - **Gate**: hobby servo, 50 Hz, 500-2400 us pulses
//! - **Turntable**: second hobby servo on the refill carousel (optional)
//! - **Beam**: laser emitter and receiver module across the chute
//! - **Thermometer**: DHT11 on a single-wire data pin (optional)
//!
//! # Pin Assignments
//!
//! See the [`pins`] module.

mod beam;
mod button;
mod clock;
mod motor;
mod servo;
mod thermometer;

pub use beam::Esp32Beam;
pub use button::Esp32Button;
pub use clock::Esp32Clock;
pub use motor::Esp32FeedMotor;
pub use servo::Esp32Servo;
pub use thermometer::Esp32Dht11;

#[cfg(feature = "wifi")]
mod wifi;
#[cfg(feature = "wifi")]
pub use wifi::Esp32Wifi;

#[cfg(feature = "esp32-mqtt")]
mod mqtt;
#[cfg(feature = "esp32-mqtt")]
pub use mqtt::{Esp32Mqtt, Esp32MqttError};

/// Pin assignments for the dispenser board.
pub mod pins {
    // =========================================================================
    // Feed Motor (BTS7960)
    // =========================================================================

    /// Forward PWM (LPWM on BTS7960)
    pub const L_PWM: i32 = 26;

    /// Reverse PWM (RPWM on BTS7960), held at zero
    pub const R_PWM: i32 = 25;

    /// Right half-bridge enable
    pub const R_EN: i32 = 27;

    /// Left half-bridge enable
    pub const L_EN: i32 = 14;

    // =========================================================================
    // Servos
    // =========================================================================

    /// Gate servo signal
    pub const GATE_SERVO: i32 = 5;

    /// Refill turntable servo signal
    pub const TURNTABLE_SERVO: i32 = 21;

    // =========================================================================
    // Sensors
    // =========================================================================

    /// Laser receiver output (HIGH while the beam is blocked)
    pub const BEAM_RX: i32 = 22;

    /// Laser emitter, driven HIGH at boot
    pub const BEAM_TX: i32 = 23;

    /// DHT11 data line
    pub const DHT_DATA: i32 = 4;

    /// Provisioning reset button (active low, internal pull-up)
    pub const RESET_BUTTON: i32 = 13;
}
