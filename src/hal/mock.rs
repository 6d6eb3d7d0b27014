//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and network traits,
//! enabling development and testing on desktop without physical hardware.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockBeam`] | [`BeamSensor`] | Scripted beam samples |
//! | [`MockFeedMotor`] | [`FeedMotor`] | Tracks level writes |
//! | [`MockServo`] | [`ServoOutput`] | Tracks angle writes |
//! | [`MockThermometer`] | [`TemperatureSensor`] | Fixed or failing reading |
//! | [`MockButton`] | [`ResetButton`] | Settable button state |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockNetwork`] | [`NetworkLink`] | Scriptable link drops and recovery |
//! | [`MockMqtt`] | [`MqttClient`] | Captures pub/sub operations |
//!
//! [`MockBoard`] and [`MockControlLoop`] name the fully mocked assembly.
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::hal::{MockBeam, MockMqtt};
//! use rs_dispenser::traits::{BeamSensor, MqttClient};
//!
//! let mut beam = MockBeam::new();
//! beam.queue_samples(&[true, false]);
//! assert!(beam.is_blocked());
//! assert!(!beam.is_blocked());
//!
//! let mut mqtt = MockMqtt::new();
//! mqtt.publish("mediflow/Dispenser_A/status", b"{}", false).unwrap();
//! assert_eq!(mqtt.published_to("mediflow/Dispenser_A/status").len(), 1);
//! ```
//!
//! [`BeamSensor`]: crate::traits::BeamSensor
//! [`FeedMotor`]: crate::traits::FeedMotor
//! [`ServoOutput`]: crate::traits::ServoOutput
//! [`TemperatureSensor`]: crate::traits::TemperatureSensor
//! [`ResetButton`]: crate::traits::ResetButton
//! [`Clock`]: crate::traits::Clock
//! [`NetworkLink`]: crate::traits::NetworkLink
//! [`MqttClient`]: crate::traits::MqttClient

extern crate alloc;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::control::{Board, ControlLoop};
use crate::traits::{
    BeamSensor, Clock, FeedMotor, MqttClient, MqttMessage, NetworkLink, ResetButton, ServoOutput,
    TemperatureSensor,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock beam sensor.
///
/// Queued samples are returned one per call; once the queue is empty the
/// last returned state (or the one set with [`MockBeam::set_blocked`])
/// repeats.
///
/// # Example
///
/// ```rust
/// use rs_dispenser::hal::MockBeam;
/// use rs_dispenser::traits::BeamSensor;
///
/// let mut beam = MockBeam::new();
/// beam.queue_samples(&[true, true, false]);
/// assert!(beam.is_blocked());
/// assert!(beam.is_blocked());
/// assert!(!beam.is_blocked());
/// assert!(!beam.is_blocked()); // holds last state
/// ```
#[derive(Debug, Default)]
pub struct MockBeam {
    samples: VecDeque<bool>,
    /// Current beam state.
    pub blocked: bool,
    /// Number of times the sensor was read.
    pub reads: usize,
}

impl MockBeam {
    /// Creates a clear beam with no queued samples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue samples to be returned in order.
    pub fn queue_samples(&mut self, samples: &[bool]) {
        self.samples.extend(samples.iter().copied());
    }

    /// Queue one full pill pass (blocked then clear).
    pub fn queue_pill(&mut self) {
        self.queue_samples(&[true, false]);
    }

    /// Set the steady state returned once the queue is empty.
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Number of samples still queued.
    pub fn pending(&self) -> usize {
        self.samples.len()
    }
}

impl BeamSensor for MockBeam {
    fn is_blocked(&mut self) -> bool {
        self.reads += 1;
        if let Some(next) = self.samples.pop_front() {
            self.blocked = next;
        }
        self.blocked
    }
}

/// Mock feed motor for testing.
///
/// Records level writes. Set `fail` to make every write return an error.
///
/// # Example
///
/// ```rust
/// use rs_dispenser::hal::MockFeedMotor;
/// use rs_dispenser::traits::FeedMotor;
///
/// let mut motor = MockFeedMotor::new();
/// motor.set_level(60).unwrap();
/// motor.stop().unwrap();
///
/// assert_eq!(motor.level, 0);
/// assert_eq!(motor.history, vec![60, 0]);
/// ```
#[derive(Debug, Default)]
pub struct MockFeedMotor {
    /// Current duty level.
    pub level: u8,
    /// Every level written, in order.
    pub history: Vec<u8>,
    /// When true, writes fail.
    pub fail: bool,
}

impl MockFeedMotor {
    /// Creates a stopped motor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedMotor for MockFeedMotor {
    type Error = ();

    fn set_level(&mut self, level: u8) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.level = level;
        self.history.push(level);
        Ok(())
    }
}

/// Mock servo for testing the gate and turntable.
///
/// `angle` is `None` until the first write.
#[derive(Debug, Default)]
pub struct MockServo {
    /// Last commanded angle.
    pub angle: Option<u8>,
    /// Every angle written, in order.
    pub history: Vec<u8>,
    /// Number of writes.
    pub writes: usize,
    /// When true, writes fail.
    pub fail: bool,
}

impl MockServo {
    /// Creates a servo with no commanded position.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ServoOutput for MockServo {
    type Error = ();

    fn set_angle(&mut self, angle: u8) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        let angle = angle.min(180);
        self.angle = Some(angle);
        self.history.push(angle);
        self.writes += 1;
        Ok(())
    }
}

/// Mock temperature sensor.
///
/// # Example
///
/// ```rust
/// use rs_dispenser::hal::MockThermometer;
/// use rs_dispenser::traits::TemperatureSensor;
///
/// let mut t = MockThermometer::new(23.5);
/// assert_eq!(t.read_celsius(), Some(23.5));
///
/// t.fault();
/// assert_eq!(t.read_celsius(), None);
/// ```
#[derive(Debug, Default)]
pub struct MockThermometer {
    /// Value returned by the next read; `None` simulates a sensor fault.
    pub reading: Option<f32>,
    /// Number of reads.
    pub reads: usize,
}

impl MockThermometer {
    /// Creates a sensor reporting a fixed value.
    pub fn new(celsius: f32) -> Self {
        Self {
            reading: Some(celsius),
            reads: 0,
        }
    }

    /// Make subsequent reads fail.
    pub fn fault(&mut self) {
        self.reading = None;
    }
}

impl TemperatureSensor for MockThermometer {
    fn read_celsius(&mut self) -> Option<f32> {
        self.reads += 1;
        self.reading.filter(|t| !t.is_nan())
    }
}

/// Mock reset button.
#[derive(Debug, Default)]
pub struct MockButton {
    /// Whether the button is held.
    pub pressed: bool,
}

impl MockButton {
    /// Creates a released button.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResetButton for MockButton {
    fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use rs_dispenser::hal::MockClock;
/// use rs_dispenser::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Network Mocks
// ============================================================================

/// Mock network link.
///
/// `reconnect` fails `reconnect_failures` times, then succeeds and marks
/// the link up.
#[derive(Debug)]
pub struct MockNetwork {
    /// Whether the station is associated.
    pub connected: bool,
    /// Number of upcoming reconnect attempts that fail.
    pub reconnect_failures: u32,
    /// Number of reconnect attempts made.
    pub reconnect_calls: usize,
    /// Number of credential resets.
    pub reset_calls: usize,
}

impl MockNetwork {
    /// Creates a connected link.
    pub fn new() -> Self {
        Self {
            connected: true,
            reconnect_failures: 0,
            reconnect_calls: 0,
            reset_calls: 0,
        }
    }

    /// Creates a link that starts down.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    /// Simulate losing the access point.
    pub fn drop_link(&mut self) {
        self.connected = false;
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkLink for MockNetwork {
    type Error = ();

    fn is_network_connected(&self) -> bool {
        self.connected
    }

    fn reconnect(&mut self) -> Result<(), ()> {
        self.reconnect_calls += 1;
        if self.reconnect_failures > 0 {
            self.reconnect_failures -= 1;
            return Err(());
        }
        self.connected = true;
        Ok(())
    }

    fn reset_credentials(&mut self) -> Result<(), ()> {
        self.reset_calls += 1;
        self.connected = false;
        Ok(())
    }
}

/// Mock MQTT client for testing.
///
/// Records all publish/subscribe operations and allows injecting
/// incoming messages for testing message handling. Publishing while
/// disconnected fails, as a real client would.
///
/// # Example
///
/// ```rust
/// use rs_dispenser::hal::MockMqtt;
/// use rs_dispenser::traits::MqttClient;
///
/// let mut mqtt = MockMqtt::new();
///
/// // Queue incoming message
/// mqtt.queue_message("mediflow/Dispenser_A/command", br#"{"command":"dispense"}"#.to_vec());
/// assert!(mqtt.try_recv().is_some());
///
/// // Connection failures can be scripted
/// let mut mqtt = MockMqtt::disconnected();
/// mqtt.connect_failures = 1;
/// assert!(mqtt.connect().is_err());
/// assert!(mqtt.connect().is_ok());
/// assert_eq!(mqtt.connect_calls, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockMqtt {
    /// Messages that have been published (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    /// Topics that have been subscribed to.
    pub subscriptions: Vec<String>,
    /// Queue of incoming messages to be returned by `try_recv()`.
    pub incoming: Vec<MqttMessage>,
    /// Whether the client is connected.
    pub connected: bool,
    /// Number of upcoming connect attempts that fail.
    pub connect_failures: u32,
    /// Number of connect attempts made.
    pub connect_calls: usize,
}

impl MockMqtt {
    /// Creates a new mock MQTT client in connected state.
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Creates a client that has not connected yet.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Queue an incoming message
    pub fn queue_message(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.incoming.push(MqttMessage::new(topic, payload));
    }

    /// Check if a topic was subscribed to
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    /// Get published messages for a topic
    pub fn published_to(&self, topic: &str) -> Vec<&(String, Vec<u8>, bool)> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .collect()
    }

    /// Payloads published to a topic, as UTF-8 text.
    pub fn payloads_to(&self, topic: &str) -> Vec<String> {
        self.published_to(topic)
            .into_iter()
            .map(|(_, p, _)| String::from_utf8_lossy(p).into_owned())
            .collect()
    }
}

impl MqttClient for MockMqtt {
    type Error = ();

    fn connect(&mut self) -> Result<(), ()> {
        self.connect_calls += 1;
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(());
        }
        self.connected = true;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), ()> {
        if !self.connected {
            return Err(());
        }
        self.published.push((topic.into(), payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ()> {
        if !self.connected {
            return Err(());
        }
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        if self.incoming.is_empty() {
            None
        } else {
            Some(self.incoming.remove(0))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ============================================================================
// Assembled Mocks
// ============================================================================

/// A board built entirely from mocks. The gate and turntable are both
/// [`MockServo`].
pub type MockBoard = Board<MockBeam, MockFeedMotor, MockServo, MockThermometer, MockServo, MockButton>;

/// A control loop running on [`MockBoard`] with mock network collaborators.
pub type MockControlLoop = ControlLoop<
    MockBeam,
    MockFeedMotor,
    MockServo,
    MockThermometer,
    MockServo,
    MockNetwork,
    MockMqtt,
    MockButton,
>;

// ============================================================================
// Tests
// ============================================================================
