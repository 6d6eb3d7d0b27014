//! Desktop simulator: the full control loop against a real MQTT broker.
//!
//! The dispenser hardware is simulated with mocks. While a session is
//! active a pill passes the beam every `PILL_PERIOD_MS`, so a dispense
//! command published to the broker runs to completion and produces the
//! same status and health traffic as the device.
//!
//! # Usage
//!
//! ```sh
//! MQTT_HOST=localhost MQTT_PORT=1883 RUST_LOG=info \
//!     cargo run --example desktop_sim --features mqtt
//!
//! mosquitto_pub -t mediflow/Dispenser_A/command \
//!     -m '{"command":"dispense","quantity":3,"prescription_id":"RX-1"}'
//! mosquitto_sub -t 'mediflow/Dispenser_A/#' -v
//! ```

use std::thread;
use std::time::Duration;

use log::{error, info};
use rs_dispenser::hal::{
    HostClock, HostNetwork, MockBeam, MockBoard, MockFeedMotor, MockServo, MockThermometer,
    RumqttTransport,
};
use rs_dispenser::traits::Clock;
use rs_dispenser::{Board, Config, ControlLoop, MqttConfig};

/// Simulated time between pills while the feeder runs.
const PILL_PERIOD_MS: u64 = 300;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1883);

    let config = Config::default().with_mqtt(
        MqttConfig::default()
            .with_host(&host)
            .with_port(port)
            .with_client_id("MediFlow_desktop_sim")
            .with_heartbeat_ms(10_000),
    );

    let board: MockBoard = Board::new(MockBeam::new(), MockFeedMotor::new(), MockServo::new())
        .with_thermometer(MockThermometer::new(22.5))
        .with_turntable(MockServo::new());
    let mut control = ControlLoop::new(
        board,
        HostNetwork::new(),
        RumqttTransport::new(&config.mqtt),
        &config,
    );
    if let Err(e) = control.init() {
        error!("init: {e}");
    }

    info!("simulating dispenser on {host}:{port}, Ctrl+C to quit");

    let clock = HostClock::new();
    let tick = Duration::from_millis(u64::from(config.dispenser.tick_interval_ms));
    let mut next_pill_ms = 0;

    loop {
        let now = clock.now_ms();

        if control.session().is_active() && now >= next_pill_ms {
            control.beam_mut().queue_pill();
            next_pill_ms = now + PILL_PERIOD_MS;
        }

        match control.tick(now) {
            Ok(report) => {
                if report.completed {
                    info!("session complete: {}", control.session().dispensed());
                }
                if let Some(event) = report.refill {
                    info!("refill: {event:?}");
                }
            }
            Err(e) => error!("tick: {e}"),
        }

        thread::sleep(tick);
    }
}
