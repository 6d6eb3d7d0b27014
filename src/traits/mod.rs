//! Trait definitions for hardware abstraction and networking.
//!
//! This module defines the collaborator seams that allow rs-dispenser to:
//! - Run on different hardware (ESP32, desktop mock)
//! - Use different network and transport implementations
//!
//! # Submodules
//!
//! - `hardware`: Beam sensor, feed motor, servos, thermometer, clock
//! - `network`: Station link and MQTT client traits
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`BeamSensor`]: Optical gate that counts falling pills
//! - [`FeedMotor`]: PWM-based DC feed motor
//! - [`ServoOutput`]: Gate and turntable servos
//! - [`Clock`]: Time source for `no_std` environments

pub mod hardware;
pub mod network;

pub use hardware::*;
pub use network::*;
