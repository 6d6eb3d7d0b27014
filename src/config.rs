//! Shared configuration system for desktop and ESP32.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::config::{Config, DispenserConfig, MqttConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.mqtt.command_topic().as_str(), "mediflow/Dispenser_A/command");
//!
//! // Or customize
//! let config = Config::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100").with_port(1883))
//!     .with_dispenser(DispenserConfig::default().with_feed_level(90));
//! assert_eq!(config.dispenser.feed_level, 90);
//! ```

use heapless::String as HString;

/// Maximum length for short config strings (hostnames, client IDs)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (topics)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Copy as many whole characters of `s` as fit into `N` bytes.
fn bounded<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    for c in s.chars() {
        if hs.push(c).is_err() {
            break;
        }
    }
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    bounded(s)
}

/// Create a LongString from a &str, truncating if too long
pub fn long_string(s: &str) -> LongString {
    bounded(s)
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// WiFi connection configuration
    pub wifi: WifiConfig,
    /// MQTT client configuration
    pub mqtt: MqttConfig,
    /// Dispensing mechanism configuration
    pub dispenser: DispenserConfig,
    /// Refill turntable configuration
    pub refill: RefillConfig,
    /// Device identification
    pub device: DeviceConfig,
}

impl Config {
    /// Set WiFi configuration
    pub fn with_wifi(mut self, wifi: WifiConfig) -> Self {
        self.wifi = wifi;
        self
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set dispenser configuration
    pub fn with_dispenser(mut self, dispenser: DispenserConfig) -> Self {
        self.dispenser = dispenser;
        self
    }

    /// Set refill configuration
    pub fn with_refill(mut self, refill: RefillConfig) -> Self {
        self.refill = refill;
        self
    }

    /// Set device configuration
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Client ID (should be unique per device)
    pub client_id: ShortString,
    /// Topic prefix for all pub/sub (e.g. "mediflow/Dispenser_A")
    pub topic_prefix: ShortString,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Health telemetry interval in milliseconds
    pub heartbeat_ms: u32,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Delay between failed connection attempts in milliseconds
    pub retry_delay_ms: u32,
    /// Whether MQTT is enabled
    pub enabled: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: short_string("localhost"),
            port: 8883,
            client_id: short_string("MediFlow_ESP32_1"),
            topic_prefix: short_string("mediflow/Dispenser_A"),
            username: ShortString::new(),
            password: ShortString::new(),
            heartbeat_ms: 30_000,
            keep_alive_secs: 30,
            retry_delay_ms: 5_000,
            enabled: true,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set the topic prefix
    pub fn with_topic_prefix(mut self, prefix: &str) -> Self {
        self.topic_prefix = short_string(prefix);
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the health telemetry interval
    pub fn with_heartbeat_ms(mut self, ms: u32) -> Self {
        self.heartbeat_ms = ms;
        self
    }

    /// Set the delay between connection attempts
    pub fn with_retry_delay_ms(mut self, ms: u32) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Enable or disable MQTT
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Build a topic string with the configured prefix
    pub fn topic(&self, suffix: &str) -> LongString {
        let mut topic = LongString::new();
        let _ = topic.push_str(self.topic_prefix.as_str());
        let _ = topic.push('/');
        let _ = topic.push_str(suffix);
        topic
    }

    /// Inbound dispense commands.
    pub fn command_topic(&self) -> LongString {
        self.topic("command")
    }

    /// Dispense progress reports.
    pub fn status_topic(&self) -> LongString {
        self.topic("status")
    }

    /// Online/offline announcements and temperature telemetry.
    pub fn health_topic(&self) -> LongString {
        self.topic("health")
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }
}

// ============================================================================
// Dispenser Config
// ============================================================================

/// Dispensing mechanism configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispenserConfig {
    /// Pill count used when a command omits or garbles `quantity`
    pub default_quantity: u32,
    /// Feed motor duty level while dispensing (0-255)
    pub feed_level: u8,
    /// Gate servo angle that lets pills through
    pub gate_open_angle: u8,
    /// Gate servo angle that blocks the chute
    pub gate_closed_angle: u8,
    /// Control loop period in milliseconds
    pub tick_interval_ms: u32,
}

impl Default for DispenserConfig {
    fn default() -> Self {
        Self {
            default_quantity: 10,
            feed_level: 60,
            gate_open_angle: 90,
            gate_closed_angle: 0,
            tick_interval_ms: 20,
        }
    }
}

impl DispenserConfig {
    /// Set the fallback quantity
    pub fn with_default_quantity(mut self, quantity: u32) -> Self {
        self.default_quantity = quantity;
        self
    }

    /// Set the feed motor level
    pub fn with_feed_level(mut self, level: u8) -> Self {
        self.feed_level = level;
        self
    }

    /// Set the gate open and closed angles
    pub fn with_gate_angles(mut self, open: u8, closed: u8) -> Self {
        self.gate_open_angle = open.min(180);
        self.gate_closed_angle = closed.min(180);
        self
    }

    /// Set the control loop period
    pub fn with_tick_interval_ms(mut self, ms: u32) -> Self {
        self.tick_interval_ms = ms;
        self
    }
}

// ============================================================================
// Refill Config
// ============================================================================

/// Refill turntable configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefillConfig {
    /// Pills in the reservoir at boot
    pub initial_reservoir: i32,
    /// A refill starts when the reservoir drops below this
    pub threshold: i32,
    /// Pills added by one refill cycle
    pub refill_amount: i32,
    /// Turntable angle that drops pills into the feeder
    pub load_angle: u8,
    /// Turntable resting angle
    pub rest_angle: u8,
    /// How long the turntable stays at the load angle, in milliseconds
    pub hold_ms: u32,
}

impl Default for RefillConfig {
    fn default() -> Self {
        Self {
            initial_reservoir: 30,
            threshold: 5,
            refill_amount: 20,
            load_angle: 180,
            rest_angle: 0,
            hold_ms: 2_000,
        }
    }
}

impl RefillConfig {
    /// Set the initial reservoir count
    pub fn with_initial_reservoir(mut self, count: i32) -> Self {
        self.initial_reservoir = count;
        self
    }

    /// Set the refill threshold
    pub fn with_threshold(mut self, threshold: i32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the amount added per refill
    pub fn with_refill_amount(mut self, amount: i32) -> Self {
        self.refill_amount = amount;
        self
    }

    /// Set the load hold time
    pub fn with_hold_ms(mut self, ms: u32) -> Self {
        self.hold_ms = ms;
        self
    }
}

// ============================================================================
// WiFi Config
// ============================================================================

/// WiFi connection configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WifiConfig {
    /// WiFi network SSID
    pub ssid: ShortString,
    /// WiFi password
    pub password: ShortString,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u32,
    /// How long the reset button must be held to wipe credentials
    pub reset_hold_ms: u32,
    /// Whether WiFi is enabled
    pub enabled: bool,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: ShortString::new(),
            password: ShortString::new(),
            connect_timeout_ms: 30_000,
            reset_hold_ms: 5_000,
            enabled: true,
        }
    }
}

impl WifiConfig {
    /// Set the SSID
    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = short_string(ssid);
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = short_string(password);
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Set the reset button hold time
    pub fn with_reset_hold_ms(mut self, ms: u32) -> Self {
        self.reset_hold_ms = ms;
        self
    }

    /// Enable or disable WiFi
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check if WiFi credentials are configured
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Device identification configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Human-readable device name
    pub name: ShortString,
    /// Dispenser ID (one per physical unit)
    pub id: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("MediFlow"),
            id: short_string("Dispenser_A"),
        }
    }
}

impl DeviceConfig {
    /// Set the device name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the device ID
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = short_string(id);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.dispenser.default_quantity, 10);
        assert_eq!(config.refill.threshold, 5);
    }

    #[test]
    fn mqtt_topic_building() {
        let mqtt = MqttConfig::default().with_topic_prefix("clinic/unit7");
        assert_eq!(mqtt.topic("debug").as_str(), "clinic/unit7/debug");
        assert_eq!(mqtt.command_topic().as_str(), "clinic/unit7/command");
        assert_eq!(mqtt.status_topic().as_str(), "clinic/unit7/status");
        assert_eq!(mqtt.health_topic().as_str(), "clinic/unit7/health");
    }

    #[test]
    fn mqtt_default_topics() {
        let mqtt = MqttConfig::default();
        assert_eq!(mqtt.command_topic().as_str(), "mediflow/Dispenser_A/command");
        assert_eq!(mqtt.health_topic().as_str(), "mediflow/Dispenser_A/health");
    }

    #[test]
    fn mqtt_auth_detection() {
        let no_auth = MqttConfig::default();
        assert!(!no_auth.has_auth());

        let with_auth = MqttConfig::default().with_auth("user", "pass");
        assert!(with_auth.has_auth());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_mqtt(
                MqttConfig::default()
                    .with_host("broker.local")
                    .with_port(1883)
                    .with_retry_delay_ms(1000),
            )
            .with_refill(RefillConfig::default().with_threshold(3))
            .with_device(DeviceConfig::default().with_name("Ward 3"));

        assert_eq!(config.mqtt.host.as_str(), "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.retry_delay_ms, 1000);
        assert_eq!(config.refill.threshold, 3);
        assert_eq!(config.device.name.as_str(), "Ward 3");
    }

    // =========================================================================
    // DispenserConfig Tests
    // =========================================================================

    #[test]
    fn dispenser_config_default() {
        let d = DispenserConfig::default();
        assert_eq!(d.feed_level, 60);
        assert_eq!(d.gate_open_angle, 90);
        assert_eq!(d.gate_closed_angle, 0);
        assert_eq!(d.tick_interval_ms, 20);
    }

    #[test]
    fn dispenser_gate_angles_clamped() {
        let d = DispenserConfig::default().with_gate_angles(200, 10);
        assert_eq!(d.gate_open_angle, 180);
        assert_eq!(d.gate_closed_angle, 10);
    }

    // =========================================================================
    // RefillConfig Tests
    // =========================================================================

    #[test]
    fn refill_config_default() {
        let r = RefillConfig::default();
        assert_eq!(r.initial_reservoir, 30);
        assert_eq!(r.refill_amount, 20);
        assert_eq!(r.load_angle, 180);
        assert_eq!(r.rest_angle, 0);
        assert_eq!(r.hold_ms, 2_000);
    }

    // =========================================================================
    // WifiConfig Tests
    // =========================================================================

    #[test]
    fn wifi_config_default() {
        let wifi = WifiConfig::default();
        assert!(wifi.ssid.is_empty());
        assert_eq!(wifi.connect_timeout_ms, 30_000);
        assert_eq!(wifi.reset_hold_ms, 5_000);
        assert!(wifi.enabled);
    }

    #[test]
    fn wifi_config_is_configured() {
        assert!(!WifiConfig::default().is_configured());
        assert!(WifiConfig::default().with_ssid("Clinic").is_configured());
        assert!(!WifiConfig::default().with_ssid("").is_configured());
    }

    // =========================================================================
    // String Helper Tests
    // =========================================================================

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn long_string_truncation() {
        let long_input = "b".repeat(200);
        let s = long_string(&long_input);
        assert_eq!(s.len(), MAX_LONG_STRING);
    }

    #[test]
    fn string_helpers_utf8_boundary() {
        // 63 ASCII bytes then a 4-byte char: the char must be dropped, not split
        let input = alloc::format!("{}\u{1F48A}", "x".repeat(63));
        let s = short_string(&input);
        assert_eq!(s.len(), 63);
        assert!(core::str::from_utf8(s.as_bytes()).is_ok());
    }
}
