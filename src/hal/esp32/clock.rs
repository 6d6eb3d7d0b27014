//! Monotonic clock from the ESP-IDF high resolution timer.

use crate::traits::Clock;

/// Milliseconds since boot via `esp_timer_get_time()`.
///
/// Never wraps in practice (the timer is 64-bit microseconds), so elapsed
/// time arithmetic in the control loop is plain subtraction.
///
/// # Example
///
/// ```ignore
/// use rs_dispenser::hal::esp32::Esp32Clock;
/// use rs_dispenser::traits::Clock;
///
/// let clock = Esp32Clock::new();
/// control.tick(clock.now_ms())?;
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates the clock.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        // Plain read of the hardware timer, no side effects
        let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
        u64::try_from(micros / 1000).unwrap_or(0)
    }
}
