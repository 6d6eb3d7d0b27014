//! Network and transport recovery.
//!
//! [`ConnectivityManager`] owns the network link and the MQTT client and is
//! polled once per control tick. It observes both layers by polling status
//! (never by callback) and recovers them independently:
//!
//! 1. Network down: attempt one reconnect. On success, go straight on to
//!    the transport in the same tick.
//! 2. Transport down (network up): attempt one broker connect. On success,
//!    subscribe to the command topic and announce `{"status":"online"}` on
//!    the health topic.
//!
//! A failed attempt schedules the next one `retry_delay_ms` later on the
//! monotonic clock; the loop is never put to sleep. Retries are unbounded.
//!
//! While the transport is down, [`ConnectivityManager::publish`] drops the
//! message instead of queueing it.
//!
//! # Example
//!
//! ```rust
//! use rs_dispenser::config::MqttConfig;
//! use rs_dispenser::connectivity::{ConnectivityEvent, ConnectivityManager};
//! use rs_dispenser::hal::{MockMqtt, MockNetwork};
//!
//! let mut conn = ConnectivityManager::new(MockNetwork::new(), MockMqtt::disconnected(), &MqttConfig::default());
//! assert_eq!(conn.maintain(0), ConnectivityEvent::Connected);
//! assert!(conn.client().is_subscribed("mediflow/Dispenser_A/command"));
//! assert!(conn.publish("mediflow/Dispenser_A/status", b"{}"));
//! ```

use log::{debug, info, warn};

use crate::config::{LongString, MqttConfig};
use crate::error::TransportError;
use crate::messages::ONLINE;
use crate::traits::{MqttClient, MqttMessage, NetworkLink};

/// Observed state of the two layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    /// Station associated with the access point.
    pub network_up: bool,
    /// Broker session established, subscribed and announced.
    pub transport_up: bool,
}

/// Result of one [`ConnectivityManager::maintain`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// Both layers were already up.
    Online,
    /// The transport came up during this call.
    Connected,
    /// The network is down.
    NetworkDown {
        /// A reconnect was attempted (and failed) this call.
        attempted: bool,
    },
    /// The network is up but the transport is down.
    TransportDown {
        /// A connect was attempted (and failed) this call.
        attempted: bool,
    },
}

impl ConnectivityEvent {
    /// True if the transport is usable after this call.
    pub fn is_up(&self) -> bool {
        matches!(self, Self::Online | Self::Connected)
    }
}

/// Keeps the network and transport alive.
pub struct ConnectivityManager<N: NetworkLink, C: MqttClient> {
    link: N,
    client: C,
    state: ConnectivityState,
    command_topic: LongString,
    health_topic: LongString,
    retry_delay_ms: u64,
    next_network_attempt: u64,
    next_transport_attempt: u64,
    announced: bool,
    reconnects: u32,
}

impl<N: NetworkLink, C: MqttClient> ConnectivityManager<N, C> {
    /// Create a manager. Nothing is attempted until the first
    /// [`Self::maintain`].
    pub fn new(link: N, client: C, config: &MqttConfig) -> Self {
        Self {
            link,
            client,
            state: ConnectivityState::default(),
            command_topic: config.command_topic(),
            health_topic: config.health_topic(),
            retry_delay_ms: u64::from(config.retry_delay_ms),
            next_network_attempt: 0,
            next_transport_attempt: 0,
            announced: false,
            reconnects: 0,
        }
    }

    /// Observe both layers and make at most one recovery attempt for each.
    pub fn maintain(&mut self, now_ms: u64) -> ConnectivityEvent {
        if !self.link.is_network_connected() {
            if self.state.network_up {
                warn!("network lost");
            }
            self.state = ConnectivityState::default();
            self.announced = false;

            if now_ms < self.next_network_attempt {
                return ConnectivityEvent::NetworkDown { attempted: false };
            }
            match self.link.reconnect() {
                Ok(()) => {
                    info!("network reconnected");
                    // Fresh link: try the broker right away.
                    self.next_transport_attempt = now_ms;
                }
                Err(e) => {
                    warn!(
                        "network reconnect failed: {e:?}, retry in {} ms",
                        self.retry_delay_ms
                    );
                    self.next_network_attempt = now_ms + self.retry_delay_ms;
                    return ConnectivityEvent::NetworkDown { attempted: true };
                }
            }
        }
        self.state.network_up = true;

        if self.client.is_connected() && self.announced {
            self.state.transport_up = true;
            return ConnectivityEvent::Online;
        }

        if self.state.transport_up {
            warn!("transport lost");
        }
        self.state.transport_up = false;
        self.announced = false;

        if now_ms < self.next_transport_attempt {
            return ConnectivityEvent::TransportDown { attempted: false };
        }
        match self.establish() {
            Ok(()) => {
                self.state.transport_up = true;
                self.announced = true;
                self.reconnects += 1;
                info!("transport up, listening on {}", self.command_topic);
                ConnectivityEvent::Connected
            }
            Err(e) => {
                warn!("transport {e}, retry in {} ms", self.retry_delay_ms);
                self.next_transport_attempt = now_ms + self.retry_delay_ms;
                ConnectivityEvent::TransportDown { attempted: true }
            }
        }
    }

    /// Connect if needed, then subscribe and announce.
    fn establish(&mut self) -> Result<(), TransportError> {
        if !self.client.is_connected() {
            self.client.connect().map_err(|e| {
                debug!("connect: {e:?}");
                TransportError::Connect
            })?;
        }
        self.client
            .subscribe(self.command_topic.as_str())
            .map_err(|e| {
                debug!("subscribe: {e:?}");
                TransportError::Subscribe
            })?;
        self.client
            .publish(self.health_topic.as_str(), ONLINE.as_bytes(), false)
            .map_err(|e| {
                debug!("announce: {e:?}");
                TransportError::Publish
            })
    }

    /// Publish if the transport is up. Returns false if the message was
    /// dropped.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if !self.state.transport_up {
            debug!("transport down, dropped publish to {topic}");
            return false;
        }
        match self.client.publish(topic, payload, false) {
            Ok(()) => true,
            Err(e) => {
                warn!("publish to {topic} failed: {e:?}");
                false
            }
        }
    }

    /// Next inbound message, if any.
    pub fn try_recv(&mut self) -> Option<MqttMessage> {
        self.client.try_recv()
    }

    /// Topic dispense commands arrive on.
    pub fn command_topic(&self) -> &str {
        self.command_topic.as_str()
    }

    /// Topic health reports go to.
    pub fn health_topic(&self) -> &str {
        self.health_topic.as_str()
    }

    /// Last observed state.
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Number of successful transport connections since boot.
    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    /// Access the network link.
    pub fn link(&self) -> &N {
        &self.link
    }

    /// Mutable access to the network link.
    pub fn link_mut(&mut self) -> &mut N {
        &mut self.link
    }

    /// Access the MQTT client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Mutable access to the MQTT client.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockMqtt, MockNetwork};

    const HEALTH: &str = "mediflow/Dispenser_A/health";
    const COMMAND: &str = "mediflow/Dispenser_A/command";

    fn manager(net: MockNetwork, mqtt: MockMqtt) -> ConnectivityManager<MockNetwork, MockMqtt> {
        ConnectivityManager::new(net, mqtt, &MqttConfig::default())
    }

    // =========================================================================
    // Transport
    // =========================================================================

    #[test]
    fn first_maintain_connects_and_announces() {
        let mut c = manager(MockNetwork::new(), MockMqtt::disconnected());
        assert_eq!(c.maintain(0), ConnectivityEvent::Connected);
        assert!(c.state().transport_up);
        assert!(c.client().is_subscribed(COMMAND));
        assert_eq!(c.client().payloads_to(HEALTH), vec![ONLINE]);
        assert_eq!(c.maintain(20), ConnectivityEvent::Online);
        assert_eq!(c.client().connect_calls, 1);
    }

    #[test]
    fn already_connected_client_still_announces() {
        let mut c = manager(MockNetwork::new(), MockMqtt::new());
        assert_eq!(c.maintain(0), ConnectivityEvent::Connected);
        assert_eq!(c.client().connect_calls, 0);
        assert!(c.client().is_subscribed(COMMAND));
    }

    #[test]
    fn failed_connect_backs_off() {
        let mut mqtt = MockMqtt::disconnected();
        mqtt.connect_failures = 2;
        let mut c = manager(MockNetwork::new(), mqtt);

        assert_eq!(
            c.maintain(0),
            ConnectivityEvent::TransportDown { attempted: true }
        );
        for t in [20, 1000, 4999] {
            assert_eq!(
                c.maintain(t),
                ConnectivityEvent::TransportDown { attempted: false }
            );
        }
        assert_eq!(c.client().connect_calls, 1);

        assert_eq!(
            c.maintain(5000),
            ConnectivityEvent::TransportDown { attempted: true }
        );
        assert_eq!(c.maintain(10_000), ConnectivityEvent::Connected);
        assert_eq!(c.client().connect_calls, 3);
    }

    #[test]
    fn transport_loss_reannounces() {
        let mut c = manager(MockNetwork::new(), MockMqtt::new());
        c.maintain(0);
        c.client_mut().connected = false;

        assert_eq!(c.maintain(20), ConnectivityEvent::Connected);
        assert_eq!(c.client().payloads_to(HEALTH).len(), 2);
        assert_eq!(c.reconnects(), 2);
    }

    #[test]
    fn broker_drop_with_failed_reconnect() {
        let mut c = manager(MockNetwork::new(), MockMqtt::new());
        c.maintain(0);
        c.client_mut().connected = false;
        c.client_mut().connect_failures = 1;

        assert_eq!(
            c.maintain(20),
            ConnectivityEvent::TransportDown { attempted: true }
        );
        assert!(!c.state().transport_up);
        assert!(c.state().network_up);
        assert!(!c.publish("mediflow/Dispenser_A/status", b"{}"));
    }

    // =========================================================================
    // Network
    // =========================================================================

    #[test]
    fn network_down_skips_transport() {
        let mut net = MockNetwork::disconnected();
        net.reconnect_failures = 1;
        let mut c = manager(net, MockMqtt::disconnected());

        assert_eq!(
            c.maintain(0),
            ConnectivityEvent::NetworkDown { attempted: true }
        );
        assert_eq!(c.client().connect_calls, 0);
        assert!(!c.state().network_up);

        // Backoff holds until retry delay elapses
        assert_eq!(
            c.maintain(100),
            ConnectivityEvent::NetworkDown { attempted: false }
        );
        assert_eq!(c.link().reconnect_calls, 1);
    }

    #[test]
    fn network_recovery_connects_transport_same_call() {
        let mut net = MockNetwork::disconnected();
        net.reconnect_failures = 1;
        let mut c = manager(net, MockMqtt::disconnected());
        c.maintain(0);

        assert_eq!(c.maintain(5000), ConnectivityEvent::Connected);
        assert_eq!(c.link().reconnect_calls, 2);
        assert_eq!(c.client().connect_calls, 1);
        assert_eq!(
            c.state(),
            ConnectivityState {
                network_up: true,
                transport_up: true
            }
        );
    }

    #[test]
    fn network_loss_marks_both_down() {
        let mut c = manager(MockNetwork::new(), MockMqtt::new());
        c.maintain(0);
        c.link_mut().drop_link();
        c.link_mut().reconnect_failures = 5;

        assert_eq!(
            c.maintain(20),
            ConnectivityEvent::NetworkDown { attempted: true }
        );
        assert_eq!(c.state(), ConnectivityState::default());
    }

    // =========================================================================
    // Publish
    // =========================================================================

    #[test]
    fn publish_dropped_while_down() {
        let mut mqtt = MockMqtt::disconnected();
        mqtt.connect_failures = 1;
        let mut c = manager(MockNetwork::new(), mqtt);
        c.maintain(0);

        assert!(!c.publish("mediflow/Dispenser_A/status", b"{}"));
        assert!(c.client().published.is_empty());
    }

    #[test]
    fn publish_when_up() {
        let mut c = manager(MockNetwork::new(), MockMqtt::new());
        c.maintain(0);
        assert!(c.publish("mediflow/Dispenser_A/status", b"{}"));
        assert_eq!(c.client().published_to("mediflow/Dispenser_A/status").len(), 1);
    }

    #[test]
    fn publish_error_reports_false() {
        let mut c = manager(MockNetwork::new(), MockMqtt::new());
        c.maintain(0);
        // Broker dropped between maintain and publish
        c.client_mut().connected = false;
        assert!(!c.publish("mediflow/Dispenser_A/status", b"{}"));
    }
}
