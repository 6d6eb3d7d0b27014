//! # rs-dispenser
//!
//! Firmware core for a networked pill dispenser: a feed motor pushes pills
//! through a gate past a break-beam sensor, each pill is counted, and the
//! device reports progress and health over MQTT.
//!
//! ## Features
//!
//! - **Edge-triggered counting**: a pill counts once, when the beam goes from blocked to clear
//! - **Dispense sessions**: start (or restart) from a JSON command, stop the feed and close the gate on target
//! - **Tolerant command parsing**: any well-formed dispense command is accepted, everything else is ignored
//! - **Connectivity resilience**: network and broker reconnects on a backoff, without stalling the count
//! - **Health telemetry**: periodic temperature reports, `null` when the sensor fails
//! - **Refill turntable**: reservoir tracking with a one-shot refill cycle below the threshold
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and network abstractions
//! - `sensor`, `session`, `actuator`, `refill` - Dispensing logic
//! - `command`, `messages` - Inbound and outbound payloads
//! - `connectivity`, `telemetry` - Network upkeep
//! - `control` - The single control loop that ties everything together
//! - `hal` - Concrete implementations (mock for testing, desktop MQTT, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use rs_dispenser::{Board, Config, ControlLoop};
//! use rs_dispenser::hal::{MockBeam, MockBoard, MockFeedMotor, MockMqtt, MockNetwork, MockServo};
//!
//! let board: MockBoard = Board::new(MockBeam::new(), MockFeedMotor::new(), MockServo::new());
//! let mut control = ControlLoop::new(board, MockNetwork::new(), MockMqtt::new(), &Config::default());
//! control.init().unwrap();
//!
//! // Call once per tick (20ms by default) in your main loop
//! let report = control.tick(0).unwrap();
//! assert!(report.connectivity.transport_up);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Gate and feed motor control.
pub mod actuator;
/// Long-press detection for the reset button.
pub mod button;
/// Tolerant parsing of inbound dispense commands.
pub mod command;
/// Shared configuration system for desktop and ESP32.
pub mod config;
/// Broker and network upkeep with backoff.
pub mod connectivity;
/// The control loop.
pub mod control;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Outbound status and health payloads.
pub mod messages;
/// Reservoir tracking and the refill cycle.
pub mod refill;
/// Beam edge detection.
pub mod sensor;
/// Dispense session state machine.
pub mod session;
/// Health telemetry timer.
pub mod telemetry;
/// Core traits for hardware and network abstraction.
pub mod traits;

// Re-exports for convenience
pub use actuator::ActuatorController;
pub use command::{Command, DispenseRequest};
pub use config::{Config, DeviceConfig, DispenserConfig, MqttConfig, RefillConfig, WifiConfig};
pub use connectivity::{ConnectivityEvent, ConnectivityManager, ConnectivityState};
pub use control::{Board, Capabilities, ControlLoop, TickReport};
pub use error::{ActuatorError, Error, Result, TransportError};
pub use messages::{HealthReport, StatusMessage};
pub use refill::{RefillEvent, RefillPhase, RefillState, RefillUnit};
pub use sensor::{EdgeDetector, EdgeEvent};
pub use session::{DispenseSession, SessionMeta};
pub use telemetry::TelemetryTimer;
pub use traits::{
    // Hardware
    BeamSensor,
    Clock,
    FeedMotor,
    // Network
    MqttClient,
    MqttMessage,
    NetworkLink,
    ResetButton,
    ServoOutput,
    TemperatureSensor,
};
