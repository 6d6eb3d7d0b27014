//! Reservoir tracking and the refill turntable cycle.
//!
//! Every counted pill takes one from the reservoir. When the count drops
//! below the threshold the turntable swings to its load angle, holds there
//! for `hold_ms`, swings back and the reservoir is credited with
//! `refill_amount`.
//!
//! The hold is a phase on the monotonic clock, not a sleep, so the control
//! loop keeps sampling the beam while the turntable is loading:
//!
//! ```text
//! Idle ──(reservoir < threshold && !refilling)──► Loading{since}
//!  ▲                                                   │
//!  └──────────────(now - since >= hold_ms)─────────────┘
//! ```
//!
//! `refilling` is set on entering `Loading` and cleared on leaving it, so
//! one threshold crossing produces exactly one cycle.
//!
//! Because the hold does not block, pills counted while `Loading` still
//! decrement the reservoir with `refilling` set. They are included in the
//! total credited at the end of the hold and never start a second cycle.

use log::{info, warn};

use crate::config::RefillConfig;
use crate::error::ActuatorError;
use crate::traits::ServoOutput;

/// Reservoir counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefillState {
    /// Pills believed to be in the reservoir. May go negative if the
    /// feeder keeps dispensing while empty.
    pub reservoir: i32,
    /// Refill starts below this count.
    pub threshold: i32,
    /// Pills added per cycle.
    pub refill_amount: i32,
    /// A cycle is in progress.
    pub refilling: bool,
}

impl RefillState {
    /// Whether a new cycle should start.
    pub fn needs_refill(&self) -> bool {
        self.reservoir < self.threshold && !self.refilling
    }
}

/// Turntable phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefillPhase {
    /// At rest.
    Idle,
    /// At the load angle since the given time.
    Loading {
        /// When the turntable reached the load angle.
        since: u64,
    },
}

/// What an update did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefillEvent {
    /// A cycle started.
    Started,
    /// A cycle finished; the reservoir now holds this many.
    Completed(i32),
}

/// Refill turntable and reservoir bookkeeping.
pub struct RefillUnit<S: ServoOutput> {
    turntable: S,
    state: RefillState,
    phase: RefillPhase,
    load_angle: u8,
    rest_angle: u8,
    hold_ms: u32,
}

impl<S: ServoOutput> RefillUnit<S> {
    /// Create a unit at rest.
    pub fn new(turntable: S, config: &RefillConfig) -> Self {
        Self {
            turntable,
            state: RefillState {
                reservoir: config.initial_reservoir,
                threshold: config.threshold,
                refill_amount: config.refill_amount,
                refilling: false,
            },
            phase: RefillPhase::Idle,
            load_angle: config.load_angle,
            rest_angle: config.rest_angle,
            hold_ms: config.hold_ms,
        }
    }

    /// Take one pill from the reservoir.
    pub fn on_pill_dispensed(&mut self) {
        self.state.reservoir -= 1;
    }

    /// Advance the cycle.
    ///
    /// Phase changes happen even if the servo write fails, so a broken
    /// turntable cannot wedge the unit in one phase; the error is still
    /// reported.
    pub fn update(&mut self, now_ms: u64) -> Result<Option<RefillEvent>, ActuatorError> {
        match self.phase {
            RefillPhase::Idle if self.state.needs_refill() => {
                info!(
                    "reservoir at {} (< {}), refilling",
                    self.state.reservoir, self.state.threshold
                );
                self.state.refilling = true;
                self.phase = RefillPhase::Loading { since: now_ms };
                self.drive(self.load_angle)?;
                Ok(Some(RefillEvent::Started))
            }
            RefillPhase::Loading { since } if now_ms.saturating_sub(since) >= u64::from(self.hold_ms) => {
                self.state.reservoir += self.state.refill_amount;
                self.state.refilling = false;
                self.phase = RefillPhase::Idle;
                info!("refill complete, reservoir at {}", self.state.reservoir);
                self.drive(self.rest_angle)?;
                Ok(Some(RefillEvent::Completed(self.state.reservoir)))
            }
            _ => Ok(None),
        }
    }

    fn drive(&mut self, angle: u8) -> Result<(), ActuatorError> {
        self.turntable.set_angle(angle).map_err(|e| {
            warn!("turntable to {angle} failed: {e:?}");
            ActuatorError::Turntable
        })
    }

    /// Move the turntable to rest without touching the counters.
    pub fn park(&mut self) -> Result<(), ActuatorError> {
        self.drive(self.rest_angle)
    }

    /// Reservoir counters.
    pub fn state(&self) -> &RefillState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> RefillPhase {
        self.phase
    }

    /// Access the turntable servo.
    pub fn turntable(&self) -> &S {
        &self.turntable
    }

    /// Mutable access to the turntable servo.
    pub fn turntable_mut(&mut self) -> &mut S {
        &mut self.turntable
    }
}
