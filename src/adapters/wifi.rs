//! WiFi station-mode adapter.
//!
//! Implements [`NetworkPort`] — the boundary the time-sync engine uses
//! for its join → fetch → drop cycle. The radio stays off except
//! during that window; there is no reconnect policy on purpose, as the
//! next sync interval simply tries again.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via
//!   `esp_idf_svc::wifi::BlockingWifi`.
//! - **all other targets**: simulation stub for host-side tests.

use log::{info, warn};

use crate::clock::NetworkPort;
use crate::config::SystemConfig;
use crate::error::CommsError;

// ───────────────────────────────────────────────────────────────
// On-target adapter
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use espidf::WifiAdapter;

#[cfg(target_os = "espidf")]
mod espidf {
    use super::*;
    use esp_idf_svc::wifi::{
        AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi,
    };

    /// Owns the driver handle for the whole firmware lifetime; the
    /// radio itself is only powered between `join` and `leave`.
    pub struct WifiAdapter {
        wifi: BlockingWifi<EspWifi<'static>>,
        ssid: heapless::String<32>,
        password: heapless::String<64>,
    }

    impl WifiAdapter {
        pub fn new(wifi: BlockingWifi<EspWifi<'static>>, config: &SystemConfig) -> Self {
            Self {
                wifi,
                ssid: config.wifi_ssid.clone(),
                password: config.wifi_password.clone(),
            }
        }
    }

    impl NetworkPort for WifiAdapter {
        fn has_credentials(&self) -> bool {
            !self.ssid.is_empty()
        }

        fn join(&mut self, _timeout_ms: u32) -> Result<[u8; 4], CommsError> {
            if self.ssid.is_empty() {
                return Err(CommsError::NoCredentials);
            }

            let auth_method = if self.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };
            let client = ClientConfiguration {
                ssid: self.ssid.as_str().try_into().map_err(|_| CommsError::JoinFailed)?,
                password: self
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| CommsError::JoinFailed)?,
                auth_method,
                ..Default::default()
            };
            self.wifi
                .set_configuration(&Configuration::Client(client))
                .map_err(|_| CommsError::JoinFailed)?;

            info!("WiFi: joining '{}'", self.ssid);
            self.wifi.start().map_err(|_| CommsError::JoinFailed)?;
            self.wifi.connect().map_err(|e| {
                warn!("WiFi: connect failed: {}", e);
                CommsError::JoinFailed
            })?;
            // Timeout is governed by the IDF netif wait inside the
            // blocking wrapper.
            self.wifi.wait_netif_up().map_err(|_| CommsError::JoinTimeout)?;

            let ip = self
                .wifi
                .wifi()
                .sta_netif()
                .get_ip_info()
                .map_err(|_| CommsError::JoinFailed)?
                .ip;
            info!("WiFi: joined, ip={}", ip);
            Ok(ip.octets())
        }

        fn leave(&mut self) {
            if let Err(e) = self.wifi.disconnect() {
                warn!("WiFi: disconnect failed: {}", e);
            }
            if let Err(e) = self.wifi.stop() {
                warn!("WiFi: stop failed: {}", e);
            }
            info!("WiFi: radio dropped");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation adapter (host builds, tests)
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub use sim::WifiAdapter;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use super::*;

    /// Host stand-in. Joins succeed after an optional scripted number
    /// of failures, handing back a fixed LAN address.
    pub struct WifiAdapter {
        ssid: heapless::String<32>,
        joined: bool,
        /// Failures to report before the next join succeeds.
        pub fail_next_joins: u32,
        pub join_count: u32,
    }

    impl WifiAdapter {
        pub fn new(config: &SystemConfig) -> Self {
            Self {
                ssid: config.wifi_ssid.clone(),
                joined: false,
                fail_next_joins: 0,
                join_count: 0,
            }
        }
    }

    impl NetworkPort for WifiAdapter {
        fn has_credentials(&self) -> bool {
            !self.ssid.is_empty()
        }

        fn join(&mut self, _timeout_ms: u32) -> Result<[u8; 4], CommsError> {
            if self.ssid.is_empty() {
                return Err(CommsError::NoCredentials);
            }
            self.join_count += 1;
            if self.fail_next_joins > 0 {
                self.fail_next_joins -= 1;
                warn!("WiFi(sim): scripted join failure");
                return Err(CommsError::JoinTimeout);
            }
            self.joined = true;
            info!("WiFi(sim): joined '{}'", self.ssid);
            Ok([192, 168, 4, 20])
        }

        fn leave(&mut self) {
            self.joined = false;
            info!("WiFi(sim): left network");
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    fn config_with_creds() -> SystemConfig {
        let mut config = SystemConfig::default();
        config.wifi_ssid = heapless::String::try_from("HomeNet").unwrap();
        config.wifi_password = heapless::String::try_from("hunter22").unwrap();
        config
    }

    #[test]
    fn no_credentials_refuses_join() {
        let mut adapter = WifiAdapter::new(&SystemConfig::default());
        assert!(!adapter.has_credentials());
        assert_eq!(adapter.join(10_000), Err(CommsError::NoCredentials));
    }

    #[test]
    fn join_leave_roundtrip() {
        let mut adapter = WifiAdapter::new(&config_with_creds());
        assert!(adapter.has_credentials());
        let ip = adapter.join(10_000).unwrap();
        assert_eq!(ip, [192, 168, 4, 20]);
        adapter.leave();
    }

    #[test]
    fn scripted_failures_then_success() {
        let mut adapter = WifiAdapter::new(&config_with_creds());
        adapter.fail_next_joins = 2;
        assert!(adapter.join(10_000).is_err());
        assert!(adapter.join(10_000).is_err());
        assert!(adapter.join(10_000).is_ok());
        assert_eq!(adapter.join_count, 3);
    }
}
