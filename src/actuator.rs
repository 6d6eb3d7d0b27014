//! Gate and feed motor sequencing.
//!
//! [`ActuatorController`] owns the feed motor and gate servo and drives
//! them to a small set of named positions. Every call is a single
//! fire-and-forget HAL write; repeating a call re-asserts the same
//! position and has no other effect.
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::actuator::ActuatorController;
//! use rs_dispenser::config::DispenserConfig;
//! use rs_dispenser::hal::{MockFeedMotor, MockServo};
//!
//! let mut act = ActuatorController::new(MockFeedMotor::new(), MockServo::new(), &DispenserConfig::default());
//! act.open_gate().unwrap();
//! act.set_feed_level(60).unwrap();
//! assert!(act.gate_open());
//! assert_eq!(act.feed().level, 60);
//!
//! act.stop_feed().unwrap();
//! act.close_gate().unwrap();
//! assert_eq!(act.gate().angle, Some(0));
//! ```

use log::warn;

use crate::config::DispenserConfig;
use crate::error::ActuatorError;
use crate::traits::{FeedMotor, ServoOutput};

/// Drives the feed motor and the dispensing gate.
///
/// # Type Parameters
///
/// - `M`: feed motor ([`FeedMotor`])
/// - `G`: gate servo ([`ServoOutput`])
pub struct ActuatorController<M: FeedMotor, G: ServoOutput> {
    feed: M,
    gate: G,
    open_angle: u8,
    closed_angle: u8,
    feed_level: u8,
    gate_open: bool,
}

impl<M: FeedMotor, G: ServoOutput> ActuatorController<M, G> {
    /// Create a controller. Nothing is written to hardware until the
    /// first call; use [`Self::park`] at boot.
    pub fn new(feed: M, gate: G, config: &DispenserConfig) -> Self {
        Self {
            feed,
            gate,
            open_angle: config.gate_open_angle,
            closed_angle: config.gate_closed_angle,
            feed_level: 0,
            gate_open: false,
        }
    }

    /// Stop the feed and close the gate.
    pub fn park(&mut self) -> Result<(), ActuatorError> {
        self.stop_feed()?;
        self.close_gate()
    }

    /// Move the gate to the open angle.
    pub fn open_gate(&mut self) -> Result<(), ActuatorError> {
        self.gate.set_angle(self.open_angle).map_err(|e| {
            warn!("gate open failed: {e:?}");
            ActuatorError::Gate
        })?;
        self.gate_open = true;
        Ok(())
    }

    /// Move the gate to the closed angle.
    pub fn close_gate(&mut self) -> Result<(), ActuatorError> {
        self.gate.set_angle(self.closed_angle).map_err(|e| {
            warn!("gate close failed: {e:?}");
            ActuatorError::Gate
        })?;
        self.gate_open = false;
        Ok(())
    }

    /// Drive the feed motor at `level` (0-255).
    pub fn set_feed_level(&mut self, level: u8) -> Result<(), ActuatorError> {
        self.feed.set_level(level).map_err(|e| {
            warn!("feed level {level} failed: {e:?}");
            ActuatorError::Feed
        })?;
        self.feed_level = level;
        Ok(())
    }

    /// Stop the feed motor.
    pub fn stop_feed(&mut self) -> Result<(), ActuatorError> {
        self.feed.stop().map_err(|e| {
            warn!("feed stop failed: {e:?}");
            ActuatorError::Feed
        })?;
        self.feed_level = 0;
        Ok(())
    }

    /// Last commanded feed level.
    pub fn feed_level(&self) -> u8 {
        self.feed_level
    }

    /// Whether the gate was last commanded open.
    pub fn gate_open(&self) -> bool {
        self.gate_open
    }

    /// Access the feed motor.
    pub fn feed(&self) -> &M {
        &self.feed
    }

    /// Mutable access to the feed motor.
    pub fn feed_mut(&mut self) -> &mut M {
        &mut self.feed
    }

    /// Access the gate servo.
    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// Mutable access to the gate servo.
    pub fn gate_mut(&mut self) -> &mut G {
        &mut self.gate
    }
}
