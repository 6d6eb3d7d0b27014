//! Hardware abstraction traits for the beam sensor, actuators and sensors.
//!
//! This module defines the narrow hardware interfaces the control loop
//! talks to, so the same loop runs on the ESP32, on a desktop simulator
//! and against the mocks in tests.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`BeamSensor`] | Optical gate the pills fall through |
//! | [`FeedMotor`] | PWM-driven DC feed motor |
//! | [`ServoOutput`] | Hobby servo (gate and refill turntable) |
//! | [`TemperatureSensor`] | Enclosure temperature for health telemetry |
//! | [`ResetButton`] | Provisioning reset button |
//! | [`Clock`] | Monotonic time source for `no_std` environments |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For ESP32 hardware, use the
//! implementations from `hal::esp32` (requires `esp32` feature).
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::traits::{FeedMotor, ServoOutput};
//! use rs_dispenser::hal::{MockFeedMotor, MockServo};
//!
//! let mut motor = MockFeedMotor::new();
//! motor.set_level(60).unwrap();
//! assert_eq!(motor.level, 60);
//!
//! let mut gate = MockServo::new();
//! gate.set_angle(90).unwrap();
//! assert_eq!(gate.angle, Some(90));
//! ```

/// Optical beam sensor (emitter/receiver pair) across the pill chute.
///
/// A falling pill interrupts the beam for a short time. The sensor is
/// sampled once per control tick; edge detection happens in
/// [`crate::sensor::EdgeDetector`], not here.
pub trait BeamSensor {
    /// Returns `true` while the beam is interrupted.
    fn is_blocked(&mut self) -> bool;
}

/// Feed motor trait - abstracts the PWM-driven DC motor that pushes pills
/// towards the chute.
///
/// # Implementation Notes
///
/// - `level` is a raw duty value, 0 (off) to 255 (full)
/// - Writes are fire-and-forget; implementations must not block
/// - Repeating the same level is allowed and has no extra effect
///
/// # Example Implementation
///
/// ```rust,ignore
/// use rs_dispenser::traits::FeedMotor;
///
/// struct MyMotor { /* hardware handles */ }
///
/// impl FeedMotor for MyMotor {
///     type Error = ();
///
///     fn set_level(&mut self, level: u8) -> Result<(), ()> {
///         // Set PWM duty cycle...
///         Ok(())
///     }
/// }
/// ```
pub trait FeedMotor {
    /// Error type for motor operations.
    type Error: core::fmt::Debug;

    /// Drive the motor at the given duty level (0-255).
    fn set_level(&mut self, level: u8) -> Result<(), Self::Error>;

    /// Convenience method to stop the motor.
    ///
    /// Sets the duty level to 0.
    fn stop(&mut self) -> Result<(), Self::Error> {
        self.set_level(0)
    }
}

/// Position-controlled hobby servo.
///
/// Used for the dispensing gate and, on boards that have one, for the
/// refill turntable.
pub trait ServoOutput {
    /// Error type for servo operations.
    type Error: core::fmt::Debug;

    /// Move to the given angle in degrees (0-180).
    ///
    /// Values above 180 should be clamped by the implementation.
    fn set_angle(&mut self, angle: u8) -> Result<(), Self::Error>;
}

/// Temperature sensor used for health telemetry.
pub trait TemperatureSensor {
    /// Read the temperature in degrees Celsius.
    ///
    /// Returns `None` on a sensor fault. Implementations that get a NaN
    /// from the driver should report it as `None`.
    fn read_celsius(&mut self) -> Option<f32>;
}

/// Push button used to wipe network credentials.
///
/// Typically active-low with a pull-up; implementations hide polarity.
pub trait ResetButton {
    /// Returns true if the button is currently held down.
    fn is_pressed(&self) -> bool;
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for scheduling. On desktop,
/// this can wrap `std::time::Instant`. On embedded, use a hardware timer.
///
/// # Example
///
/// ```rust
/// use rs_dispenser::traits::Clock;
/// use rs_dispenser::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}
