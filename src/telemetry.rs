//! Fixed-interval health telemetry timer.
//!
//! The timer fires when `now - last_publish >= interval` and then resets
//! `last_publish` to `now`, whether or not the temperature read that
//! follows succeeds. `last_publish` starts at zero, so the first report
//! goes out one interval after boot.

/// Interval timer for the health heartbeat.
#[derive(Clone, Debug)]
pub struct TelemetryTimer {
    last_publish_ms: u64,
    interval_ms: u64,
}

impl TelemetryTimer {
    /// Timer with the given interval, last fired at time zero.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            last_publish_ms: 0,
            interval_ms,
        }
    }

    /// Returns true if the interval has elapsed, and restarts it.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_publish_ms) >= self.interval_ms {
            self.last_publish_ms = now_ms;
            true
        } else {
            false
        }
    }

    /// Time of the last fire.
    pub fn last_publish_ms(&self) -> u64 {
        self.last_publish_ms
    }

    /// Configured interval.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }
}
