//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the CogniPet
//! firmware. Two things live in flash: the config blob (postcard) and
//! the assessed flag the first-boot router checks.
//!
//! - Config validation: fields are range-checked before persistence.
//! - Namespace isolation: config and domain flags share the
//!   `cognipet` namespace; nothing else writes there.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::app::service::{ASSESSED_FLAG_KEY, STORAGE_NAMESPACE};
use crate::config::SystemConfig;
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_KEY: &str = "syscfg";

#[allow(dead_code)]
const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                let ret2 = unsafe { nvs_flash_erase() };
                if ret2 != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                let ret3 = unsafe { nvs_flash_init() };
                if ret3 != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// Whether this device has never completed its baseline assessment.
    pub fn is_first_boot(&self) -> bool {
        !self.exists(STORAGE_NAMESPACE, ASSESSED_FLAG_KEY)
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

}

// Raw-FFI blob plumbing. Every operation opens the namespace, does its
// work, commits when it wrote, and closes the handle. NVS names/keys
// are NUL-terminated and at most 15 chars.
#[cfg(target_os = "espidf")]
impl NvsAdapter {
    fn cstr15(text: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = text.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    fn with_namespace<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::cstr15(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Read a blob into the caller's buffer, returning the stored length.
    fn blob_read(namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, i32> {
        Self::with_namespace(namespace, false, |handle| {
            let key = Self::cstr15(key);
            let mut size = buf.len();
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(size)
        })
    }

    /// Read a blob of unknown size (size query, then the actual read).
    fn blob_read_alloc(namespace: &str, key: &str) -> Result<Vec<u8>, i32> {
        Self::with_namespace(namespace, false, |handle| {
            let key = Self::cstr15(key);
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        })
    }

    fn blob_write(namespace: &str, key: &str, data: &[u8]) -> Result<(), i32> {
        Self::with_namespace(namespace, true, |handle| {
            let key = Self::cstr15(key);
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
    }

    fn blob_erase(namespace: &str, key: &str) -> Result<(), i32> {
        Self::with_namespace(namespace, true, |handle| {
            let key = Self::cstr15(key);
            let ret = unsafe { nvs_erase_key(handle, key.as_ptr() as *const _) };
            if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
    }

    fn key_present(namespace: &str, key: &str) -> bool {
        Self::with_namespace(namespace, false, |handle| {
            let key = Self::cstr15(key);
            let ret =
                unsafe { nvs_find_key(handle, key.as_ptr() as *const _, core::ptr::null_mut()) };
            Ok(ret == ESP_OK)
        })
        .unwrap_or(false)
    }
}

fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !(10..=500).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 10–500",
        ));
    }
    if !(10..=200).contains(&cfg.debounce_ms) {
        return Err(ConfigError::ValidationFailed("debounce_ms must be 10–200"));
    }
    if !(500..=10_000).contains(&cfg.combo_hold_ms) {
        return Err(ConfigError::ValidationFailed(
            "combo_hold_ms must be 500–10000",
        ));
    }
    if !(500..=5_000).contains(&cfg.diag_exit_hold_ms) {
        return Err(ConfigError::ValidationFailed(
            "diag_exit_hold_ms must be 500–5000",
        ));
    }
    if !(10..=3600).contains(&cfg.maintenance_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "maintenance_interval_secs must be 10–3600",
        ));
    }
    if cfg.hunger_step > 20 || cfg.cleanliness_step > 20 {
        return Err(ConfigError::ValidationFailed(
            "gauge steps must be 0–20 per pass",
        ));
    }
    if cfg.hunger_high_threshold > 100
        || cfg.cleanliness_low_threshold > 100
        || cfg.mood_happy_threshold > 100
        || cfg.mood_sad_threshold > 100
    {
        return Err(ConfigError::ValidationFailed(
            "gauge thresholds must be 0–100",
        ));
    }
    if cfg.mood_sad_threshold >= cfg.mood_happy_threshold {
        return Err(ConfigError::ValidationFailed(
            "mood_sad_threshold must be < mood_happy_threshold",
        ));
    }
    if !(1_000..=60_000).contains(&cfg.connect_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "connect_timeout_ms must be 1000–60000",
        ));
    }
    if !(1_000..=30_000).contains(&cfg.sntp_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "sntp_timeout_ms must be 1000–30000",
        ));
    }
    if !(-720..=840).contains(&cfg.utc_offset_minutes) {
        return Err(ConfigError::ValidationFailed(
            "utc_offset_minutes must be -720–840",
        ));
    }
    if cfg.attention_min_delay_ms >= cfg.attention_max_delay_ms {
        return Err(ConfigError::ValidationFailed(
            "attention_min_delay_ms must be < attention_max_delay_ms",
        ));
    }
    if !(500..=10_000).contains(&cfg.attention_window_ms) {
        return Err(ConfigError::ValidationFailed(
            "attention_window_ms must be 500–10000",
        ));
    }
    if !(1_000..=60_000).contains(&cfg.game_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "game_timeout_ms must be 1000–60000",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(STORAGE_NAMESPACE, CONFIG_KEY);
            if let Some(bytes) = self.store.borrow().get(&key) {
                let cfg: SystemConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config from store");
                Ok(cfg)
            } else {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            match Self::blob_read_alloc(STORAGE_NAMESPACE, CONFIG_KEY) {
                Ok(bytes) => {
                    let cfg: SystemConfig =
                        postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                    info!("NvsAdapter: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(cfg)
                }
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsAdapter: no stored config, using defaults");
                    Ok(SystemConfig::default())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}, using defaults", e);
                    Ok(SystemConfig::default())
                }
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(STORAGE_NAMESPACE, CONFIG_KEY);
            let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
            match Self::blob_write(STORAGE_NAMESPACE, CONFIG_KEY, &bytes) {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            match Self::blob_read(namespace, key, buf) {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        Self::blob_write(namespace, key, data).map_err(|_| StorageError::IoError)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        Self::blob_erase(namespace, key).map_err(|_| StorageError::IoError)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        Self::key_present(namespace, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        let cfg = SystemConfig::default();
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_inverted_attention_delays() {
        let cfg = SystemConfig {
            attention_min_delay_ms: 4000,
            attention_max_delay_ms: 3000,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_inverted_mood_thresholds() {
        let cfg = SystemConfig {
            mood_sad_threshold: 80,
            mood_happy_threshold: 70,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_combo_hold() {
        let cfg = SystemConfig {
            combo_hold_ms: 100,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn save_rejects_invalid_config() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = SystemConfig {
            utc_offset_minutes: 2000,
            ..Default::default()
        };
        assert!(nvs.save(&cfg).is_err());
    }

    #[test]
    fn config_save_load_roundtrip() {
        let nvs = NvsAdapter::new().unwrap();
        let mut cfg = SystemConfig::default();
        cfg.wifi_ssid.push_str("HomeNet").unwrap();
        cfg.utc_offset_minutes = -300;
        nvs.save(&cfg).unwrap();

        let loaded = nvs.load().unwrap();
        assert_eq!(loaded.wifi_ssid, cfg.wifi_ssid);
        assert_eq!(loaded.utc_offset_minutes, -300);
    }

    #[test]
    fn load_without_store_returns_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = nvs.load().unwrap();
        assert_eq!(cfg.combo_hold_ms, SystemConfig::default().combo_hold_ms);
    }

    #[test]
    fn storage_round_trip() {
        let mut nvs = NvsAdapter::new().unwrap();
        let data = b"hello NVS";
        nvs.write("test_ns", "greeting", data).unwrap();
        assert!(nvs.exists("test_ns", "greeting"));

        let mut buf = [0u8; 64];
        let len = nvs.read("test_ns", "greeting", &mut buf).unwrap();
        assert_eq!(&buf[..len], data);

        nvs.delete("test_ns", "greeting").unwrap();
        assert!(!nvs.exists("test_ns", "greeting"));
    }

    #[test]
    fn storage_read_missing_key() {
        let nvs = NvsAdapter::new().unwrap();
        let mut buf = [0u8; 64];
        assert!(matches!(
            nvs.read("ns", "nope", &mut buf),
            Err(StorageError::NotFound)
        ));
    }

    #[test]
    fn first_boot_tracks_assessed_flag() {
        let mut nvs = NvsAdapter::new().unwrap();
        assert!(nvs.is_first_boot());
        nvs.write(STORAGE_NAMESPACE, ASSESSED_FLAG_KEY, &[1]).unwrap();
        assert!(!nvs.is_first_boot());
    }

    #[test]
    fn namespace_isolation() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write("ns_a", "key", b"alpha").unwrap();
        nvs.write("ns_b", "key", b"bravo").unwrap();

        let mut buf = [0u8; 64];
        let len = nvs.read("ns_a", "key", &mut buf).unwrap();
        assert_eq!(&buf[..len], b"alpha");

        let len = nvs.read("ns_b", "key", &mut buf).unwrap();
        assert_eq!(&buf[..len], b"bravo");
    }
}
