//! ESP32 pill dispenser firmware.
//!
//! Brings up the board and runs the control loop at a fixed rate
//! (`tick_interval_ms`, 20 ms by default). Each tick samples the beam,
//! counts pills, keeps WiFi and MQTT alive, handles dispense commands and
//! publishes health telemetry. See [`rs_dispenser::control`].
//!
//! # Build
//!
//! ```bash
//! WIFI_SSID=ClinicNet WIFI_PASSWORD=secret MQTT_HOST=broker.local \
//!     cargo build --release --bin esp32_main --features esp32-mqtt
//! ```

use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};
use rs_dispenser::hal::esp32::{
    Esp32Beam, Esp32Button, Esp32Clock, Esp32Dht11, Esp32FeedMotor, Esp32Mqtt, Esp32Servo,
    Esp32Wifi,
};
use rs_dispenser::traits::Clock;
use rs_dispenser::{Board, Config, ControlLoop, MqttConfig, WifiConfig};

fn main() -> anyhow::Result<()> {
    esp_idf_hal::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("MediFlow dispenser starting");

    // =========================================================================
    // Configuration
    // =========================================================================
    let config = Config::default()
        .with_wifi(
            WifiConfig::default()
                .with_ssid(option_env!("WIFI_SSID").unwrap_or(""))
                .with_password(option_env!("WIFI_PASSWORD").unwrap_or("")),
        )
        .with_mqtt(
            MqttConfig::default()
                .with_host(option_env!("MQTT_HOST").unwrap_or("localhost"))
                .with_auth(
                    option_env!("MQTT_USERNAME").unwrap_or(""),
                    option_env!("MQTT_PASSWORD").unwrap_or(""),
                ),
        );

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Feed motor (BTS7960 on GPIO26/25, enables on GPIO27/14)
    // =========================================================================
    let feed = Esp32FeedMotor::new(
        peripherals.pins.gpio26,
        peripherals.pins.gpio25,
        peripherals.ledc.timer0,
        peripherals.ledc.channel0,
        peripherals.ledc.channel1,
    )?;
    let mut r_en = PinDriver::output(peripherals.pins.gpio27)?;
    let mut l_en = PinDriver::output(peripherals.pins.gpio14)?;
    Esp32FeedMotor::enable(&mut r_en, &mut l_en)?;

    // =========================================================================
    // Servos (gate on GPIO5, turntable on GPIO21)
    // =========================================================================
    let gate = Esp32Servo::new(
        peripherals.pins.gpio5,
        peripherals.ledc.timer1,
        peripherals.ledc.channel2,
    )?;
    let turntable = Esp32Servo::new(
        peripherals.pins.gpio21,
        peripherals.ledc.timer2,
        peripherals.ledc.channel3,
    )?;

    // =========================================================================
    // Sensors
    // =========================================================================
    let beam = Esp32Beam::new(
        PinDriver::input(peripherals.pins.gpio22)?,
        PinDriver::output(peripherals.pins.gpio23)?,
    )?;
    let thermometer = Esp32Dht11::new(peripherals.pins.gpio4)?;
    let reset_button = Esp32Button::new(peripherals.pins.gpio13)?;

    // =========================================================================
    // Network
    // =========================================================================
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = Esp32Wifi::new(peripherals.modem, sysloop, Some(nvs), &config.wifi)?;
    let mqtt = Esp32Mqtt::new(&config.mqtt);

    // =========================================================================
    // Control loop
    // =========================================================================
    let board = Board::new(beam, feed, gate)
        .with_thermometer(thermometer)
        .with_turntable(turntable)
        .with_reset_button(reset_button);
    let mut control = ControlLoop::new(board, wifi, mqtt, &config);
    if let Err(e) = control.init() {
        warn!("actuator park failed: {e}");
    }

    let clock = Esp32Clock::new();
    let tick = Duration::from_millis(u64::from(config.dispenser.tick_interval_ms));
    info!(
        "control loop running every {} ms",
        config.dispenser.tick_interval_ms
    );

    loop {
        if let Err(e) = control.tick(clock.now_ms()) {
            error!("tick: {e}");
        }

        if control.restart_requested() {
            warn!("restarting after credential reset");
            thread::sleep(Duration::from_millis(500));
            unsafe { esp_idf_hal::sys::esp_restart() };
        }

        thread::sleep(tick);
    }
}
