//! Dispense session state machine.
//!
//! ```text
//!         start(target)                dispensed >= target
//! Idle ──────────────────► Dispensing ─────────────────────► Idle
//!                            │    ▲
//!                            └────┘ start(target) restarts the count
//! ```
//!
//! There is no pause, abort or error state. A session ends only by reaching
//! its target (or a power cycle).
//!
//! Completion is checked inside [`DispenseSession::record_pill`], in the
//! same call that counts the pill, and the feed stop and gate close happen
//! right there. Nothing else can observe the session between the last count
//! and the stop.
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::actuator::ActuatorController;
//! use rs_dispenser::config::DispenserConfig;
//! use rs_dispenser::hal::{MockFeedMotor, MockServo};
//! use rs_dispenser::session::{DispenseSession, Outbox, SessionMeta};
//!
//! let cfg = DispenserConfig::default();
//! let mut act = ActuatorController::new(MockFeedMotor::new(), MockServo::new(), &cfg);
//! let mut session = DispenseSession::new(cfg.feed_level);
//! let mut outbox = Outbox::new();
//!
//! session.start(2, SessionMeta::default(), &mut act, &mut outbox).unwrap();
//! assert!(session.is_active());
//!
//! session.record_pill(&mut act, &mut outbox).unwrap();
//! session.record_pill(&mut act, &mut outbox).unwrap();
//! assert!(!session.is_active());
//! assert!(outbox.last().unwrap().is_complete());
//! ```

extern crate alloc;
use alloc::vec::Vec;

use log::{debug, info};

use crate::actuator::ActuatorController;
use crate::command::DispenseRequest;
use crate::config::ShortString;
use crate::error::ActuatorError;
use crate::messages::StatusMessage;
use crate::traits::{FeedMotor, ServoOutput};

/// Status messages produced during one tick, in publish order.
pub type Outbox = Vec<StatusMessage>;

/// Provenance carried through a session for status echo.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionMeta {
    /// Prescription reference.
    pub prescription_id: Option<ShortString>,
    /// Medicine name.
    pub medicine_name: Option<ShortString>,
}

impl From<&DispenseRequest> for SessionMeta {
    fn from(req: &DispenseRequest) -> Self {
        Self {
            prescription_id: req.prescription_id.clone(),
            medicine_name: req.medicine_name.clone(),
        }
    }
}

/// Target and actual pill counts for the current dispense.
#[derive(Clone, Debug)]
pub struct DispenseSession {
    active: bool,
    dispensed: u32,
    target: u32,
    meta: SessionMeta,
    feed_level: u8,
}

impl DispenseSession {
    /// Idle session. `feed_level` is the motor duty used while dispensing.
    pub fn new(feed_level: u8) -> Self {
        Self {
            active: false,
            dispensed: 0,
            target: 0,
            meta: SessionMeta::default(),
            feed_level,
        }
    }

    /// Start a session, or restart the running one from zero.
    ///
    /// Opens the gate and starts the feed. A zero target completes in the
    /// same call.
    pub fn start<M: FeedMotor, G: ServoOutput>(
        &mut self,
        target: u32,
        meta: SessionMeta,
        actuators: &mut ActuatorController<M, G>,
        outbox: &mut Outbox,
    ) -> Result<(), ActuatorError> {
        if self.active {
            info!(
                "restarting dispense at {}/{} with new target {target}",
                self.dispensed, self.target
            );
        } else {
            info!(
                "dispense started: target {target} medicine {:?} prescription {:?}",
                meta.medicine_name, meta.prescription_id
            );
        }

        self.active = true;
        self.dispensed = 0;
        self.target = target;
        outbox.push(StatusMessage::Started {
            target,
            prescription_id: meta.prescription_id.clone(),
        });
        self.meta = meta;

        if target == 0 {
            return self.complete(actuators, outbox);
        }
        actuators.open_gate()?;
        actuators.set_feed_level(self.feed_level)
    }

    /// Count one pill.
    ///
    /// Ignored while idle. On reaching the target the feed is stopped, the
    /// gate closed and the session goes idle before this returns.
    pub fn record_pill<M: FeedMotor, G: ServoOutput>(
        &mut self,
        actuators: &mut ActuatorController<M, G>,
        outbox: &mut Outbox,
    ) -> Result<(), ActuatorError> {
        if !self.active {
            debug!("beam event while idle ignored");
            return Ok(());
        }

        self.dispensed += 1;
        debug!("pill {}/{}", self.dispensed, self.target);
        outbox.push(StatusMessage::Progress {
            count: self.dispensed,
            target: self.target,
        });

        if self.dispensed >= self.target {
            self.complete(actuators, outbox)
        } else {
            Ok(())
        }
    }

    fn complete<M: FeedMotor, G: ServoOutput>(
        &mut self,
        actuators: &mut ActuatorController<M, G>,
        outbox: &mut Outbox,
    ) -> Result<(), ActuatorError> {
        self.active = false;
        outbox.push(StatusMessage::Complete {
            count: self.dispensed,
            target: self.target,
        });
        info!("dispense complete: {}/{}", self.dispensed, self.target);

        // Close the gate even if the feed stop failed.
        let feed = actuators.stop_feed();
        let gate = actuators.close_gate();
        feed.and(gate)
    }

    /// Whether a dispense is in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Pills counted in the current (or last) session.
    pub fn dispensed(&self) -> u32 {
        self.dispensed
    }

    /// Target of the current (or last) session.
    pub fn target(&self) -> u32 {
        self.target
    }

    /// Provenance of the current (or last) session.
    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    /// Feed level used while dispensing.
    pub fn feed_level(&self) -> u8 {
        self.feed_level
    }
}
