//! WiFi station link for the ESP32.
//!
//! # Example
//!
//! ```ignore
//! use rs_dispenser::hal::esp32::Esp32Wifi;
//! use rs_dispenser::config::WifiConfig;
//!
//! let config = WifiConfig::default()
//!     .with_ssid("ClinicNet")
//!     .with_password("secret123");
//!
//! let wifi = Esp32Wifi::new(peripherals.modem, sysloop, Some(nvs), &config)?;
//! log::info!("IP: {:?}", wifi.ip_addr());
//! ```

use std::net::Ipv4Addr;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::EspError;
use esp_idf_svc::wifi::{BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

use crate::config::WifiConfig;
use crate::traits::NetworkLink;

/// Station-mode WiFi.
///
/// Credentials live in the driver's NVS-backed configuration, so a wipe
/// survives the restart that follows it.
pub struct Esp32Wifi<'a> {
    wifi: BlockingWifi<EspWifi<'a>>,
}

impl<'a> Esp32Wifi<'a> {
    /// Start the driver and make a first connection attempt.
    ///
    /// A failed first attempt is not an error: the control loop keeps
    /// retrying through [`NetworkLink::reconnect`].
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &WifiConfig,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        let mut ssid: heapless::String<32> = heapless::String::new();
        for c in config.ssid.chars() {
            if ssid.push(c).is_err() {
                break;
            }
        }
        let mut password: heapless::String<64> = heapless::String::new();
        let _ = password.push_str(config.password.as_str());

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid,
            password,
            ..Default::default()
        }))?;

        info!("WiFi starting");
        wifi.start()?;

        let mut link = Self { wifi };
        if config.is_configured() {
            info!("WiFi connecting to '{}'", config.ssid);
            if let Err(e) = link.reconnect() {
                warn!("WiFi first connect failed: {e:?}");
            }
        } else {
            warn!("WiFi has no credentials");
        }
        Ok(link)
    }

    /// Current IP address, if connected.
    pub fn ip_addr(&self) -> Option<Ipv4Addr> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip)
    }
}

impl NetworkLink for Esp32Wifi<'_> {
    type Error = EspError;

    fn is_network_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn reconnect(&mut self) -> Result<(), EspError> {
        self.wifi.connect()?;
        self.wifi.wait_netif_up()?;
        if let Some(ip) = self.ip_addr() {
            info!("WiFi connected, IP {ip}");
        }
        Ok(())
    }

    fn reset_credentials(&mut self) -> Result<(), EspError> {
        if self.is_network_connected() {
            self.wifi.disconnect()?;
        }
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        warn!("WiFi credentials cleared");
        Ok(())
    }
}
