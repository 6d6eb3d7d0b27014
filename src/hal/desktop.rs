//! Desktop transport built on the synchronous `rumqttc` client.
//!
//! The rumqttc `Connection` is driven on a background thread. It forwards
//! inbound publishes over a channel and tracks the connection flag, so the
//! control loop only ever sees the non-blocking [`MqttClient`] surface.
//!
//! rumqttc reconnects on its own while its connection iterator is being
//! polled; [`RumqttTransport::connect`] starts that thread once and afterwards
//! reports whether the broker link is currently up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rumqttc::{Client, Connection, Event, LastWill, MqttOptions, Packet, QoS};

use crate::config::MqttConfig;
use crate::messages::OFFLINE;
use crate::traits::{Clock, MqttClient, MqttMessage, NetworkLink};

/// Errors from the desktop transport.
#[derive(Debug)]
pub enum DesktopMqttError {
    /// The broker link is not up yet.
    NotConnected,
    /// The client request queue rejected the operation.
    Client(rumqttc::ClientError),
}

impl core::fmt::Display for DesktopMqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "MQTT broker not connected"),
            Self::Client(e) => write!(f, "MQTT client error: {e}"),
        }
    }
}

impl std::error::Error for DesktopMqttError {}

/// [`MqttClient`] over rumqttc.
pub struct RumqttTransport {
    options: Option<MqttOptions>,
    client: Option<Client>,
    message_rx: Option<Receiver<MqttMessage>>,
    connected: Arc<AtomicBool>,
}

impl RumqttTransport {
    /// Request queue depth handed to rumqttc.
    const CAPACITY: usize = 16;

    /// Prepare a transport. Nothing touches the network until `connect`.
    ///
    /// `{"status":"offline"}` is registered as the last will on the health
    /// topic.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(
            config.client_id.as_str(),
            config.host.as_str(),
            config.port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));
        if config.has_auth() {
            options.set_credentials(config.username.as_str(), config.password.as_str());
        }
        options.set_last_will(LastWill::new(
            config.health_topic().as_str(),
            OFFLINE,
            QoS::AtLeastOnce,
            false,
        ));

        Self {
            options: Some(options),
            client: None,
            message_rx: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn start(&mut self, options: MqttOptions) {
        info!(
            "MQTT connecting to {}:{}",
            options.broker_address().0,
            options.broker_address().1
        );
        let (client, connection) = Client::new(options, Self::CAPACITY);
        let (message_tx, message_rx) = channel::<MqttMessage>();
        let connected = Arc::clone(&self.connected);
        thread::spawn(move || drive_connection(connection, message_tx, connected));
        self.client = Some(client);
        self.message_rx = Some(message_rx);
    }
}

impl MqttClient for RumqttTransport {
    type Error = DesktopMqttError;

    fn connect(&mut self) -> Result<(), Self::Error> {
        if let Some(options) = self.options.take() {
            self.start(options);
        }
        if self.is_connected() {
            Ok(())
        } else {
            Err(DesktopMqttError::NotConnected)
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        let client = self.client.as_mut().ok_or(DesktopMqttError::NotConnected)?;
        client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
            .map_err(DesktopMqttError::Client)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        let client = self.client.as_mut().ok_or(DesktopMqttError::NotConnected)?;
        client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(DesktopMqttError::Client)
    }

    fn try_recv(&mut self) -> Option<MqttMessage> {
        match self.message_rx.as_ref()?.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.connected.store(false, Ordering::Relaxed);
                None
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

fn drive_connection(
    mut connection: Connection,
    message_tx: Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
) {
    for notification in connection.iter() {
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT broker connected");
                connected.store(true, Ordering::Relaxed);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!("MQTT message on {}", publish.topic);
                let msg = MqttMessage::new(publish.topic, publish.payload.to_vec());
                if message_tx.send(msg).is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::Relaxed) {
                    warn!("MQTT connection lost: {e}");
                } else {
                    debug!("MQTT connect failed: {e}");
                }
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
}

/// Network link for a desktop host, where the OS owns the interface.
///
/// Always reports the network as up.
#[derive(Debug, Default)]
pub struct HostNetwork;

impl HostNetwork {
    /// Creates the host link.
    pub fn new() -> Self {
        Self
    }
}

impl NetworkLink for HostNetwork {
    type Error = core::convert::Infallible;

    fn is_network_connected(&self) -> bool {
        true
    }

    fn reconnect(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn reset_credentials(&mut self) -> Result<(), Self::Error> {
        info!("host network has no stored credentials");
        Ok(())
    }
}

/// Monotonic clock for a desktop host, counting from construction.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    start: Instant,
}

impl HostClock {
    /// Starts the clock at 0 ms.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_starts_disconnected() {
        let transport = RumqttTransport::new(&MqttConfig::default());
        assert!(!transport.is_connected());
    }

    #[test]
    fn publish_before_connect_fails() {
        let mut transport = RumqttTransport::new(&MqttConfig::default());
        assert!(matches!(
            transport.publish("t", b"x", false),
            Err(DesktopMqttError::NotConnected)
        ));
        assert!(transport.try_recv().is_none());
    }

    #[test]
    fn host_network_always_up() {
        let mut net = HostNetwork::new();
        assert!(net.is_network_connected());
        assert!(net.reconnect().is_ok());
        assert!(net.reset_credentials().is_ok());
    }

    #[test]
    fn host_clock_is_monotonic() {
        let clock = HostClock::new();
        let first = clock.now_ms();
        thread::sleep(Duration::from_millis(5));
        let second = clock.now_ms();
        assert!(second >= first + 5);
    }
}
