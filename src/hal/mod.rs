//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development
//! - `desktop`: rumqttc transport, host network link and clock (requires `mqtt` feature)
//! - `esp32`: ESP32 with BTS7960 feed motor and servos (requires `esp32` feature)

pub mod mock;

#[cfg(feature = "mqtt")]
pub mod desktop;

#[cfg(feature = "esp32")]
pub mod esp32;

pub use mock::*;

#[cfg(feature = "mqtt")]
pub use desktop::{DesktopMqttError, HostClock, HostNetwork, RumqttTransport};
