//! Network abstraction traits for the station link and MQTT transport.
//!
//! The dispenser talks to its backend over MQTT. Two independent layers
//! can fail: the network association (Wi-Fi) and the transport session
//! (broker connection). Each has its own trait so the
//! [`ConnectivityManager`](crate::connectivity::ConnectivityManager) can
//! observe and recover them separately.
//!
//! # Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`NetworkLink`] | Network association status and recovery |
//! | [`MqttClient`] | Pub/sub transport for commands and status |
//!
//! # Topics
//!
//! Using the default prefix `mediflow/Dispenser_A`:
//!
//! ```text
//! mediflow/Dispenser_A/command  - Inbound dispense commands (subscribed)
//! mediflow/Dispenser_A/status   - Dispense progress (published)
//! mediflow/Dispenser_A/health   - Online/offline and temperature (published)
//! ```

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

// ============================================================================
// Network Link Trait
// ============================================================================

/// Network association (Wi-Fi station) trait.
///
/// Provisioning itself (captive portal, credential storage) lives behind
/// this trait; the control loop only polls status and asks for recovery.
pub trait NetworkLink {
    /// Error type for link operations.
    type Error: core::fmt::Debug;

    /// Check if the station is associated and has an address.
    fn is_network_connected(&self) -> bool;

    /// Try to re-associate with the stored credentials.
    ///
    /// May block for the duration of one association attempt.
    fn reconnect(&mut self) -> Result<(), Self::Error>;

    /// Erase stored credentials so the next boot enters provisioning.
    fn reset_credentials(&mut self) -> Result<(), Self::Error>;
}

// ============================================================================
// MQTT Client Trait (Sync-First Design)
// ============================================================================

/// MQTT client trait for pub/sub messaging.
///
/// This trait uses a **sync-first design** that works on both ESP32
/// (blocking I/O) and desktop.
///
/// # Implementation Notes
///
/// - `connect` establishes a fresh broker session; it may block for one
///   connection attempt but must not retry internally
/// - `publish` and `subscribe` are synchronous
/// - `try_recv` is non-blocking; the control loop drains it every tick,
///   so inbound messages are always handled on the loop's thread
///
/// # Example
///
/// ```rust,ignore
/// use rs_dispenser::traits::MqttClient;
///
/// fn announce<M: MqttClient>(client: &mut M) {
///     client.publish("mediflow/Dispenser_A/health", br#"{"status":"online"}"#, false).unwrap();
/// }
/// ```
pub trait MqttClient {
    /// Error type for MQTT operations.
    type Error: core::fmt::Debug;

    /// Connect (or reconnect) to the broker.
    fn connect(&mut self) -> Result<(), Self::Error>;

    /// Publish a message to a topic (blocking).
    ///
    /// # Arguments
    /// - `topic`: MQTT topic path
    /// - `payload`: Message bytes
    /// - `retain`: If true, broker keeps message for new subscribers
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Subscribe to a topic (blocking).
    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Try to receive the next message (non-blocking).
    ///
    /// Returns `None` if no message is available. This should never block.
    fn try_recv(&mut self) -> Option<MqttMessage>;

    /// Check if connected to broker.
    fn is_connected(&self) -> bool;
}

/// An MQTT message received from a subscription.
///
/// Contains the topic and payload of a published message.
#[derive(Clone, Debug)]
pub struct MqttMessage {
    /// Topic the message was published to.
    pub topic: String,
    /// Message payload as raw bytes.
    pub payload: Vec<u8>,
}

impl MqttMessage {
    /// Create a new MQTT message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Returns the payload as a UTF-8 string, if valid.
    pub fn payload_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_payload_str() {
        let msg = MqttMessage::new("a/b", br#"{"command":"dispense"}"#.to_vec());
        assert_eq!(msg.payload_str(), Some(r#"{"command":"dispense"}"#));
    }

    #[test]
    fn message_payload_str_invalid_utf8() {
        let msg = MqttMessage::new("a/b", vec![0xFF, 0xFE]);
        assert!(msg.payload_str().is_none());
    }
}
