//! The control loop: one cooperative tick that runs every concern.
//!
//! [`ControlLoop::tick`] is called at a fixed rate (20 ms by default) from
//! the firmware's main loop. Each tick runs, in order:
//!
//! 1. Beam sample, edge detection and pill bookkeeping (count, completion
//!    stop, reservoir decrement)
//! 2. Publish the resulting status messages
//! 3. Refill phase machine
//! 4. Connectivity maintenance (may block for one connect attempt)
//! 5. Drain inbound commands and start or restart sessions
//! 6. Health telemetry
//! 7. Reset button
//! 8. Feed motor re-assertion
//!
//! Pill bookkeeping always runs before anything that can block, so a pill
//! that just cleared the beam is counted before a slow broker connect.
//!
//! All state lives in owned fields; there is one writer and no locking.
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::config::Config;
//! use rs_dispenser::control::{Board, ControlLoop};
//! use rs_dispenser::hal::*;
//!
//! let board: MockBoard = Board::new(MockBeam::new(), MockFeedMotor::new(), MockServo::new());
//! let mut control = ControlLoop::new(board, MockNetwork::new(), MockMqtt::new(), &Config::default());
//! control.init().unwrap();
//!
//! control
//!     .connectivity_mut()
//!     .client_mut()
//!     .queue_message("mediflow/Dispenser_A/command", br#"{"command":"dispense","quantity":1}"#.to_vec());
//! control.tick(0).unwrap();
//! assert!(control.session().is_active());
//!
//! control.beam_mut().queue_pill();
//! control.tick(20).unwrap();
//! let report = control.tick(40).unwrap();
//! assert!(report.completed);
//! ```

use core::fmt;

use log::{debug, info, warn};

use crate::actuator::ActuatorController;
use crate::button::LongPress;
use crate::command::Command;
use crate::config::{Config, LongString};
use crate::connectivity::{ConnectivityEvent, ConnectivityManager, ConnectivityState};
use crate::error::Error;
use crate::messages::HealthReport;
use crate::refill::{RefillEvent, RefillUnit};
use crate::sensor::{EdgeDetector, EdgeEvent};
use crate::session::{DispenseSession, Outbox, SessionMeta};
use crate::telemetry::TelemetryTimer;
use crate::traits::{
    BeamSensor, FeedMotor, MqttClient, NetworkLink, ResetButton, ServoOutput, TemperatureSensor,
};

// ============================================================================
// Board
// ============================================================================

/// The hardware present on a given dispenser.
///
/// Optional parts switch features off: no thermometer means health reports
/// carry `"temperature":null`, no turntable disables the refill cycle, no
/// reset button disables credential wipes.
pub struct Board<B, M, G, T, S, R> {
    /// Beam sensor across the chute.
    pub beam: B,
    /// Feed motor.
    pub feed: M,
    /// Gate servo.
    pub gate: G,
    /// Enclosure thermometer.
    pub thermometer: Option<T>,
    /// Refill turntable servo.
    pub turntable: Option<S>,
    /// Provisioning reset button.
    pub reset_button: Option<R>,
}

impl<B, M, G, T, S, R> Board<B, M, G, T, S, R> {
    /// A board with only the core dispensing hardware.
    pub fn new(beam: B, feed: M, gate: G) -> Self {
        Self {
            beam,
            feed,
            gate,
            thermometer: None,
            turntable: None,
            reset_button: None,
        }
    }

    /// Add a thermometer.
    pub fn with_thermometer(mut self, thermometer: T) -> Self {
        self.thermometer = Some(thermometer);
        self
    }

    /// Add a refill turntable.
    pub fn with_turntable(mut self, turntable: S) -> Self {
        self.turntable = Some(turntable);
        self
    }

    /// Add a reset button.
    pub fn with_reset_button(mut self, button: R) -> Self {
        self.reset_button = Some(button);
        self
    }

    /// Summary of the optional parts.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            thermometer: self.thermometer.is_some(),
            turntable: self.turntable.is_some(),
            reset_button: self.reset_button.is_some(),
        }
    }
}

/// Which optional parts a board has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Temperature telemetry available.
    pub thermometer: bool,
    /// Refill cycle available.
    pub turntable: bool,
    /// Credential reset available.
    pub reset_button: bool,
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |b: bool| if b { "yes" } else { "no" };
        write!(
            f,
            "thermometer={} turntable={} reset_button={}",
            flag(self.thermometer),
            flag(self.turntable),
            flag(self.reset_button)
        )
    }
}

// ============================================================================
// Tick report
// ============================================================================

/// What happened during one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// The beam saw a blocked to clear edge.
    pub pill_passed: bool,
    /// A session reached its target this tick.
    pub completed: bool,
    /// Dispense commands accepted.
    pub commands: u32,
    /// Inbound messages ignored (unrecognized or wrong topic).
    pub ignored: u32,
    /// Messages published.
    pub published: u32,
    /// Messages dropped because the transport was down.
    pub dropped: u32,
    /// A health report went out.
    pub telemetry_sent: bool,
    /// Refill cycle progress.
    pub refill: Option<RefillEvent>,
    /// Connectivity after maintenance.
    pub connectivity: ConnectivityState,
    /// The transport came up this tick.
    pub transport_connected: bool,
    /// Credentials were wiped and the device should restart.
    pub restart_requested: bool,
}

// ============================================================================
// Control loop
// ============================================================================

/// The dispenser's single control loop.
pub struct ControlLoop<B, M, G, T, S, N, C, R>
where
    M: FeedMotor,
    G: ServoOutput,
    S: ServoOutput,
    N: NetworkLink,
    C: MqttClient,
{
    beam: B,
    edge: EdgeDetector,
    actuators: ActuatorController<M, G>,
    thermometer: Option<T>,
    refill: Option<RefillUnit<S>>,
    reset: Option<(R, LongPress)>,
    session: DispenseSession,
    conn: ConnectivityManager<N, C>,
    telemetry: TelemetryTimer,
    status_topic: LongString,
    health_topic: LongString,
    default_quantity: u32,
    outbox: Outbox,
    restart_requested: bool,
    capabilities: Capabilities,
}

impl<B, M, G, T, S, N, C, R> ControlLoop<B, M, G, T, S, N, C, R>
where
    B: BeamSensor,
    M: FeedMotor,
    G: ServoOutput,
    T: TemperatureSensor,
    S: ServoOutput,
    N: NetworkLink,
    C: MqttClient,
    R: ResetButton,
{
    /// Assemble the loop from a board and the network collaborators.
    pub fn new(board: Board<B, M, G, T, S, R>, link: N, client: C, config: &Config) -> Self {
        let capabilities = board.capabilities();
        Self {
            beam: board.beam,
            edge: EdgeDetector::new(),
            actuators: ActuatorController::new(board.feed, board.gate, &config.dispenser),
            thermometer: board.thermometer,
            refill: board
                .turntable
                .map(|servo| RefillUnit::new(servo, &config.refill)),
            reset: board
                .reset_button
                .map(|b| (b, LongPress::new(u64::from(config.wifi.reset_hold_ms)))),
            session: DispenseSession::new(config.dispenser.feed_level),
            conn: ConnectivityManager::new(link, client, &config.mqtt),
            telemetry: TelemetryTimer::new(u64::from(config.mqtt.heartbeat_ms)),
            status_topic: config.mqtt.status_topic(),
            health_topic: config.mqtt.health_topic(),
            default_quantity: config.dispenser.default_quantity,
            outbox: Outbox::new(),
            restart_requested: false,
            capabilities,
        }
    }

    /// Put the actuators in their rest positions.
    pub fn init(&mut self) -> Result<(), Error> {
        info!("dispenser board: {}", self.capabilities);
        self.actuators.park()?;
        if let Some(refill) = &mut self.refill {
            refill.park()?;
        }
        Ok(())
    }

    /// Run one pass of the loop.
    ///
    /// Every step runs even if an earlier one hit an actuator error; the
    /// first error is returned once the tick is done.
    pub fn tick(&mut self, now_ms: u64) -> Result<TickReport, Error> {
        let mut report = TickReport::default();
        let mut fault: Option<Error> = None;
        let mut note = |r: Result<(), Error>| {
            if let Err(e) = r {
                fault.get_or_insert(e);
            }
        };

        // 1. Beam
        let blocked = self.beam.is_blocked();
        if self.edge.sample(blocked) == EdgeEvent::PillPassed {
            report.pill_passed = true;
            if self.session.is_active() {
                if let Some(refill) = &mut self.refill {
                    refill.on_pill_dispensed();
                }
                note(
                    self.session
                        .record_pill(&mut self.actuators, &mut self.outbox)
                        .map_err(Error::from),
                );
                report.completed = !self.session.is_active();
            }
        }

        // 2. Status
        self.flush_outbox(&mut report);

        // 3. Refill
        if let Some(refill) = &mut self.refill {
            match refill.update(now_ms) {
                Ok(event) => report.refill = event,
                Err(e) => note(Err(e.into())),
            }
        }

        // 4. Connectivity
        let event = self.conn.maintain(now_ms);
        report.connectivity = self.conn.state();
        report.transport_connected = event == ConnectivityEvent::Connected;

        // 5. Commands
        while let Some(msg) = self.conn.try_recv() {
            if msg.topic != self.conn.command_topic() {
                debug!("message on {} ignored", msg.topic);
                report.ignored += 1;
                continue;
            }
            match Command::parse(&msg.payload) {
                Command::Dispense(req) => {
                    report.commands += 1;
                    let target = req.quantity_or(self.default_quantity);
                    note(
                        self.session
                            .start(
                                target,
                                SessionMeta::from(&req),
                                &mut self.actuators,
                                &mut self.outbox,
                            )
                            .map_err(Error::from),
                    );
                    if !self.session.is_active() {
                        report.completed = true;
                    }
                }
                Command::Unrecognized => {
                    report.ignored += 1;
                    warn!(
                        "unrecognized command: {}",
                        alloc::string::String::from_utf8_lossy(&msg.payload)
                    );
                }
            }
        }
        self.flush_outbox(&mut report);

        // 6. Telemetry
        if self.telemetry.poll(now_ms) {
            let reading = self.thermometer.as_mut().and_then(|t| t.read_celsius());
            if reading.is_none() && self.thermometer.is_some() {
                warn!("temperature read failed");
            }
            let health = HealthReport::from_reading(reading).to_json();
            if self.conn.publish(self.health_topic.as_str(), health.as_bytes()) {
                report.published += 1;
                report.telemetry_sent = true;
            } else {
                report.dropped += 1;
            }
        }

        // 7. Reset button
        if let Some((button, press)) = &mut self.reset {
            if press.update(button.is_pressed(), now_ms) {
                warn!("reset button held, wiping network credentials");
                let wiped = self.conn.link_mut().reset_credentials().map_err(|e| {
                    warn!("credential reset failed: {e:?}");
                    Error::Network
                });
                note(wiped);
                self.restart_requested = true;
            }
        }
        report.restart_requested = self.restart_requested;

        // 8. Actuator re-assertion; the gate is only rewritten when it
        // disagrees with the session
        let active = self.session.is_active();
        if self.actuators.gate_open() != active {
            let gate = if active {
                self.actuators.open_gate()
            } else {
                self.actuators.close_gate()
            };
            if gate.is_ok() {
                info!("gate {} on retry", if active { "opened" } else { "closed" });
            }
            note(gate.map_err(Error::from));
        }
        let feed = if active {
            self.actuators.set_feed_level(self.session.feed_level())
        } else {
            self.actuators.stop_feed()
        };
        note(feed.map_err(Error::from));

        match fault {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn flush_outbox(&mut self, report: &mut TickReport) {
        for msg in self.outbox.drain(..) {
            let json = msg.to_json();
            if self.conn.publish(self.status_topic.as_str(), json.as_bytes()) {
                report.published += 1;
            } else {
                report.dropped += 1;
            }
        }
    }

    /// Credentials were wiped; the caller should restart the device.
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    /// Optional hardware present.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Current dispense session.
    pub fn session(&self) -> &DispenseSession {
        &self.session
    }

    /// Gate and feed motor.
    pub fn actuators(&self) -> &ActuatorController<M, G> {
        &self.actuators
    }

    /// Mutable gate and feed motor.
    pub fn actuators_mut(&mut self) -> &mut ActuatorController<M, G> {
        &mut self.actuators
    }

    /// Refill unit, if the board has a turntable.
    pub fn refill(&self) -> Option<&RefillUnit<S>> {
        self.refill.as_ref()
    }

    /// Mutable refill unit.
    pub fn refill_mut(&mut self) -> Option<&mut RefillUnit<S>> {
        self.refill.as_mut()
    }

    /// Beam sensor.
    pub fn beam_mut(&mut self) -> &mut B {
        &mut self.beam
    }

    /// Thermometer, if present.
    pub fn thermometer_mut(&mut self) -> Option<&mut T> {
        self.thermometer.as_mut()
    }

    /// Reset button, if present.
    pub fn reset_button_mut(&mut self) -> Option<&mut R> {
        self.reset.as_mut().map(|(b, _)| b)
    }

    /// Connectivity manager.
    pub fn connectivity(&self) -> &ConnectivityManager<N, C> {
        &self.conn
    }

    /// Mutable connectivity manager.
    pub fn connectivity_mut(&mut self) -> &mut ConnectivityManager<N, C> {
        &mut self.conn
    }

    /// Telemetry timer.
    pub fn telemetry(&self) -> &TelemetryTimer {
        &self.telemetry
    }
}
