//! Edge detection for the optical beam across the pill chute.
//!
//! A pill is counted once, on the blocked to clear transition: the pill
//! has fully passed the beam at that point. The detector is sampled once
//! per control tick, so transitions that happen and revert between two
//! samples are not observable.
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::sensor::{EdgeDetector, EdgeEvent};
//!
//! let mut edge = EdgeDetector::new();
//! assert_eq!(edge.sample(true), EdgeEvent::NoEvent);
//! assert_eq!(edge.sample(true), EdgeEvent::NoEvent);
//! assert_eq!(edge.sample(false), EdgeEvent::PillPassed);
//! assert_eq!(edge.sample(false), EdgeEvent::NoEvent);
//! ```

/// Result of one beam sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEvent {
    /// The beam went from blocked to clear.
    PillPassed,
    /// Nothing to count.
    NoEvent,
}

/// Classify a pair of consecutive beam samples.
pub const fn detect(previous_blocked: bool, current_blocked: bool) -> EdgeEvent {
    if previous_blocked && !current_blocked {
        EdgeEvent::PillPassed
    } else {
        EdgeEvent::NoEvent
    }
}

/// Beam edge detector holding the previous sample.
#[derive(Debug, Clone, Default)]
pub struct EdgeDetector {
    previous_blocked: bool,
}

impl EdgeDetector {
    /// Creates a detector that assumes the beam starts clear.
    pub const fn new() -> Self {
        Self {
            previous_blocked: false,
        }
    }

    /// Feed one sample.
    ///
    /// The sample is always stored, whether or not a dispense is running,
    /// so a beam left blocked while idle cannot fire the moment a session
    /// starts.
    pub fn sample(&mut self, current_blocked: bool) -> EdgeEvent {
        let event = detect(self.previous_blocked, current_blocked);
        self.previous_blocked = current_blocked;
        event
    }

    /// Last stored sample.
    pub fn previous_blocked(&self) -> bool {
        self.previous_blocked
    }
}
