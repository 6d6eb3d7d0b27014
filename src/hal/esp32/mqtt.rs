//! MQTT transport for the ESP32 on esp-idf-svc.
//!
//! The ESP-IDF client runs its own task and reconnects by itself once
//! created. Events are drained on a helper thread: inbound publishes go into
//! a channel for `try_recv`, connect and disconnect events flip a shared flag.
//!
//! # Example
//!
//! ```ignore
//! use rs_dispenser::hal::esp32::Esp32Mqtt;
//! use rs_dispenser::config::MqttConfig;
//!
//! let config = MqttConfig::default().with_host("broker.local").with_port(1883);
//! let mqtt = Esp32Mqtt::new(&config);
//! // Handed to ConnectivityManager, which calls connect() on its schedule.
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, LwtConfiguration,
    MqttClientConfiguration, QoS,
};
use log::{debug, info, warn};

use crate::config::{long_string, LongString, MqttConfig, ShortString};
use crate::messages::OFFLINE;
use crate::traits::{MqttClient, MqttMessage};

/// Error type for ESP32 MQTT operations.
#[derive(Debug)]
pub struct Esp32MqttError(pub String);

impl core::fmt::Display for Esp32MqttError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "MQTT error: {}", self.0)
    }
}

impl std::error::Error for Esp32MqttError {}

/// [`MqttClient`] over `EspMqttClient`.
pub struct Esp32Mqtt {
    client: Option<EspMqttClient<'static>>,
    message_rx: Option<Receiver<MqttMessage>>,
    connected: Arc<AtomicBool>,
    url: LongString,
    client_id: ShortString,
    username: ShortString,
    password: ShortString,
    health_topic: LongString,
    keep_alive_secs: u16,
}

impl Esp32Mqtt {
    /// Prepare the client. The broker is not contacted until `connect`.
    ///
    /// Port 8883 selects `mqtts://` with the ESP-IDF certificate bundle.
    pub fn new(config: &MqttConfig) -> Self {
        let scheme = if config.port == 8883 { "mqtts" } else { "mqtt" };
        let url = long_string(&format!("{scheme}://{}:{}", config.host, config.port));
        Self {
            client: None,
            message_rx: None,
            connected: Arc::new(AtomicBool::new(false)),
            url,
            client_id: config.client_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            health_topic: config.health_topic(),
            keep_alive_secs: config.keep_alive_secs,
        }
    }

    fn create(&mut self) -> Result<(), Esp32MqttError> {
        let secure = self.url.starts_with("mqtts");
        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            keep_alive_interval: Some(Duration::from_secs(u64::from(self.keep_alive_secs))),
            username: (!self.username.is_empty()).then_some(self.username.as_str()),
            password: (!self.password.is_empty()).then_some(self.password.as_str()),
            lwt: Some(LwtConfiguration {
                topic: self.health_topic.as_str(),
                payload: OFFLINE.as_bytes(),
                qos: QoS::AtLeastOnce,
                retain: false,
            }),
            crt_bundle_attach: if secure {
                Some(esp_idf_svc::sys::esp_crt_bundle_attach)
            } else {
                None
            },
            ..Default::default()
        };

        info!("MQTT connecting to {}", self.url);
        let (client, mut connection) = EspMqttClient::new(self.url.as_str(), &conf)
            .map_err(|e| Esp32MqttError(format!("{e:?}")))?;

        let (message_tx, message_rx) = channel::<MqttMessage>();
        let connected = Arc::clone(&self.connected);
        thread::Builder::new()
            .stack_size(6 * 1024)
            .spawn(move || handle_mqtt_events(&mut connection, message_tx, connected))
            .map_err(|e| Esp32MqttError(format!("event thread: {e}")))?;

        self.client = Some(client);
        self.message_rx = Some(message_rx);
        Ok(())
    }

    fn client(&mut self) -> Result<&mut EspMqttClient<'static>, Esp32MqttError> {
        self.client
            .as_mut()
            .ok_or_else(|| Esp32MqttError("not started".into()))
    }
}

impl MqttClient for Esp32Mqtt {
    type Error = Esp32MqttError;

    fn connect(&mut self) -> Result<(), Self::Error> {
        if self.client.is_none() {
            self.create()?;
        }
        if self.is_connected() {
            Ok(())
        } else {
            Err(Esp32MqttError("broker not connected yet".into()))
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        let qos = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        self.client()?
            .publish(topic, qos, retain, payload)
            .map_err(|e| Esp32MqttError(format!("{e:?}")))?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.client()?
            .subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| Esp32MqttError(format!("{e:?}")))?;
        Ok(())
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

fn handle_mqtt_events(
    connection: &mut EspMqttConnection,
    message_tx: Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match connection.next() {
            Err(e) => {
                warn!("MQTT event error: {e:?}");
                thread::sleep(Duration::from_secs(1));
            }
            Ok(event) => match event.payload() {
                EventPayload::Connected(_) => {
                    info!("MQTT broker connected");
                    connected.store(true, Ordering::Relaxed);
                }
                EventPayload::Disconnected => {
                    warn!("MQTT broker disconnected");
                    connected.store(false, Ordering::Relaxed);
                }
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    details: Details::Complete,
                    ..
                } => {
                    let msg = MqttMessage::new(topic.to_string(), data.to_vec());
                    if message_tx.send(msg).is_err() {
                        return;
                    }
                }
                EventPayload::Received { .. } => {
                    debug!("chunked MQTT message dropped");
                }
                _ => {}
            },
        }
    }
}
