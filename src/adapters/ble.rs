//! BLE telemetry adapter.
//!
//! Implements [`TelemetryPort`] — the hexagonal boundary for the
//! assessment and interaction record notify channels.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid BLE GATT server via `esp_idf_svc::sys`.
//! - **all other targets**: simulation stub that records frames for host tests.
//!
//! ## GATT Service Layout
//!
//! | Characteristic       | UUID                                    | Perms       |
//! |----------------------|-----------------------------------------|-------------|
//! | Assessment Record    | `6c700002-…-8d4b2f1c9e5a`               | Read+Notify |
//! | Interaction Record   | `6c700003-…-8d4b2f1c9e5a`               | Read+Notify |
//!
//! Records are fire-and-forget: a notify with no connected or
//! subscribed central is skipped, never retried. The caller keeps its
//! own history ring for recent interactions.

use crate::app::ports::TelemetryPort;
use log::info;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x6c700001_a3d2_4e85_b917_8d4b2f1c9e5a;
pub const CHAR_ASSESSMENT: u128 = 0x6c700002_a3d2_4e85_b917_8d4b2f1c9e5a;
pub const CHAR_INTERACTION: u128 = 0x6c700003_a3d2_4e85_b917_8d4b2f1c9e5a;

pub const ASSESSMENT_FRAME_LEN: usize = 32;
pub const INTERACTION_FRAME_LEN: usize = 16;

/// Pause between a disconnect and the next advertising window. Gives
/// the controller time to tear the link down before re-advertising.
pub const READVERTISE_DELAY_MS: u32 = 500;

// ───────────────────────────────────────────────────────────────
// BLE state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

// ── ESP-IDF BLE static state (ISR-safe atomics) ───────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These atomics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONNECTED: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static BLE_ASSESS_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_INTERACT_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_ASSESS_CCCD_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_INTERACT_CCCD_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_ASSESS_SUBSCRIBED: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static BLE_INTERACT_SUBSCRIBED: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_DISCONNECT_PENDING: AtomicBool = AtomicBool::new(false);

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    unsafe {
        t.uuid.uuid128 = uuid.to_le_bytes();
    }
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    unsafe {
        t.uuid.uuid16 = uuid;
    }
    t
}

#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char(svc_handle: u16, uuid: u128, perm: u32, prop: u32) {
    use esp_idf_svc::sys::*;
    let mut char_uuid = uuid128_to_esp(uuid);
    esp_ble_gatts_add_char(
        svc_handle,
        &mut char_uuid,
        perm as esp_gatt_perm_t,
        prop as esp_gatt_char_prop_t,
        core::ptr::null_mut(),
        core::ptr::null_mut(),
    );
}

#[cfg(target_os = "espidf")]
unsafe fn add_cccd(svc_handle: u16) {
    use esp_idf_svc::sys::*;
    let mut descr_uuid = uuid16_to_esp(ESP_GATT_UUID_CHAR_CLIENT_CONFIG as u16);
    esp_ble_gatts_add_char_descr(
        svc_handle,
        &mut descr_uuid,
        (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
        core::ptr::null_mut(),
        core::ptr::null_mut(),
    );
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let svc_uuid = uuid128_to_esp(SERVICE_UUID);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: svc_uuid,
                    inst_id: 0,
                },
                is_primary: true,
            };
            esp_ble_gatts_create_service(gatts_if, &mut svc_id, 10);
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            let p = &(*param).create;
            let svc_handle = p.service_handle;
            BLE_SVC_HANDLE.store(svc_handle as u32, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            esp_ble_gatts_start_service(svc_handle);
            BLE_CHAR_STEP.store(1, AtomicOrdering::Relaxed);
            add_gatt_char(
                svc_handle,
                CHAR_ASSESSMENT,
                ESP_GATT_PERM_READ,
                ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY,
            );
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let p = &(*param).add_char;
            let handle = p.attr_handle;
            let step = BLE_CHAR_STEP.load(AtomicOrdering::Relaxed);
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            match step {
                1 => {
                    BLE_ASSESS_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: assessment char (handle={})", handle);
                    add_cccd(svc_handle);
                }
                2 => {
                    BLE_INTERACT_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: interaction char (handle={})", handle);
                    add_cccd(svc_handle);
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            let p = &(*param).add_char_descr;
            let handle = p.attr_handle;
            let step = BLE_CHAR_STEP.load(AtomicOrdering::Relaxed);
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed) as u16;
            match step {
                1 => {
                    BLE_ASSESS_CCCD_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    BLE_CHAR_STEP.store(2, AtomicOrdering::Relaxed);
                    add_gatt_char(
                        svc_handle,
                        CHAR_INTERACTION,
                        ESP_GATT_PERM_READ,
                        ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY,
                    );
                }
                2 => {
                    BLE_INTERACT_CCCD_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    BLE_CHAR_STEP.store(3, AtomicOrdering::Relaxed);
                    log::info!("BLE GATTS: all characteristics registered");
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            BLE_CONN_ID.store(p.conn_id as u32, AtomicOrdering::Relaxed);
            BLE_CONNECTED.store(true, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: central connected (conn_id={})", p.conn_id);
            crate::events::push_event(crate::events::Event::BleConnected);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONN_ID.store(0, AtomicOrdering::Relaxed);
            BLE_CONNECTED.store(false, AtomicOrdering::Relaxed);
            BLE_ASSESS_SUBSCRIBED.store(false, AtomicOrdering::Relaxed);
            BLE_INTERACT_SUBSCRIBED.store(false, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: central disconnected");
            crate::events::push_event(crate::events::Event::BleDisconnected);
            // Advertising restarts from the control loop after a short
            // pause; the callback only flags the disconnect.
            BLE_DISCONNECT_PENDING.store(true, AtomicOrdering::Relaxed);
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            // The only writable attributes are the two CCCDs; a write of
            // 0x0001 enables notifications on that characteristic.
            let p = unsafe { &(*param).write };
            let handle = p.handle as u32;
            let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };
            let enabled = data.first().is_some_and(|b| b & 0x01 != 0);

            if handle == BLE_ASSESS_CCCD_HANDLE.load(AtomicOrdering::Relaxed) {
                BLE_ASSESS_SUBSCRIBED.store(enabled, AtomicOrdering::Relaxed);
                if enabled {
                    crate::events::push_event(crate::events::Event::BleSubscribed);
                }
            } else if handle == BLE_INTERACT_CCCD_HANDLE.load(AtomicOrdering::Relaxed) {
                BLE_INTERACT_SUBSCRIBED.store(enabled, AtomicOrdering::Relaxed);
                if enabled {
                    crate::events::push_event(crate::events::Event::BleSubscribed);
                }
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    state: BleState,
    device_name: heapless::String<24>,
    /// Uptime at which the last disconnect was observed; advertising
    /// resumes [`READVERTISE_DELAY_MS`] later.
    disconnected_at: Option<u32>,
    /// Simulation: connection flag driven by tests.
    #[cfg(not(target_os = "espidf"))]
    pub sim_connected: bool,
    /// Simulation: frames a connected central would have received.
    #[cfg(not(target_os = "espidf"))]
    pub sim_assessment_frames: Vec<[u8; ASSESSMENT_FRAME_LEN]>,
    #[cfg(not(target_os = "espidf"))]
    pub sim_interaction_frames: Vec<[u8; INTERACTION_FRAME_LEN]>,
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            state: BleState::Idle,
            device_name,
            disconnected_at: None,
            #[cfg(not(target_os = "espidf"))]
            sim_connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_assessment_frames: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_interaction_frames: Vec::new(),
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    /// Bring up the stack and start advertising. Called once at boot;
    /// [`poll`](Self::poll) re-advertises after every disconnect.
    pub fn start(&mut self) {
        info!("BLE: starting advertising as '{}'", self.device_name);
        self.platform_start();
        if self.state != BleState::Failed {
            self.state = BleState::Advertising;
        }
    }

    /// Drive deferred work from the control loop. After a disconnect
    /// the adapter waits [`READVERTISE_DELAY_MS`] before advertising
    /// again, so the tear-down never races the restart.
    pub fn poll(&mut self, uptime_ms: u32) {
        if self.state == BleState::Failed {
            return;
        }
        #[cfg(target_os = "espidf")]
        if BLE_DISCONNECT_PENDING.swap(false, AtomicOrdering::Relaxed) {
            self.state = BleState::Idle;
            self.disconnected_at = Some(uptime_ms);
        }
        if let Some(since) = self.disconnected_at {
            // Wrap-safe: uptime rolls over after ~49.7 days.
            if uptime_ms.wrapping_sub(since) >= READVERTISE_DELAY_MS {
                self.disconnected_at = None;
                self.platform_advertise();
                self.state = BleState::Advertising;
            }
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) {
        use esp_idf_svc::sys::*;
        use log::error;
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK as i32 {
                error!("BLE: bt_controller_init failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK as i32 {
                error!("BLE: bt_controller_enable failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            let ret = esp_bluedroid_init();
            if ret != ESP_OK as i32 {
                error!("BLE: bluedroid_init failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            let ret = esp_bluedroid_enable();
            if ret != ESP_OK as i32 {
                error!("BLE: bluedroid_enable failed ({})", ret);
                self.state = BleState::Failed;
                return;
            }

            // Register GAP and GATTS callbacks. The static handlers post
            // connection events to the main event queue for processing.
            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));
            esp_ble_gatts_app_register(0);

            // Set device name for advertising.
            let name = self.device_name.as_bytes();
            esp_ble_gap_set_device_name(name.as_ptr() as *const _);

            info!(
                "BLE(espidf): Bluedroid stack initialized, advertising as '{}'",
                self.device_name
            );
        }
        self.platform_advertise();
    }

    #[cfg(target_os = "espidf")]
    fn platform_advertise(&mut self) {
        use esp_idf_svc::sys::*;
        unsafe {
            let mut adv_params = esp_ble_adv_params_t {
                adv_int_min: 0x20,
                adv_int_max: 0x40,
                adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
                own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
                adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
                ..core::mem::zeroed()
            };
            esp_ble_gap_start_advertising(&mut adv_params);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) {
        self.platform_advertise();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_advertise(&mut self) {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
    }

    /// Simulation: drop an active link, as a central disconnect would.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self, uptime_ms: u32) {
        self.sim_connected = false;
        self.state = BleState::Idle;
        self.disconnected_at = Some(uptime_ms);
    }

    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, char_handle: u32, payload: &[u8]) -> bool {
        use esp_idf_svc::sys::*;
        let conn = BLE_CONN_ID.load(AtomicOrdering::Relaxed);
        if char_handle == 0 || !BLE_CONNECTED.load(AtomicOrdering::Relaxed) {
            return false;
        }
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as u8,
                conn as u16,
                char_handle as u16,
                payload.len() as u16,
                payload.as_ptr() as *mut u8,
                false,
            )
        };
        ret == ESP_OK as i32
    }
}

// ───────────────────────────────────────────────────────────────
// TelemetryPort implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl TelemetryPort for BleAdapter {
    fn is_connected(&self) -> bool {
        BLE_CONNECTED.load(AtomicOrdering::Relaxed)
    }

    fn notify_assessment(&mut self, frame: &[u8; ASSESSMENT_FRAME_LEN]) -> bool {
        if !BLE_ASSESS_SUBSCRIBED.load(AtomicOrdering::Relaxed) {
            return false;
        }
        self.platform_notify(BLE_ASSESS_CHAR_HANDLE.load(AtomicOrdering::Relaxed), frame)
    }

    fn notify_interaction(&mut self, frame: &[u8; INTERACTION_FRAME_LEN]) -> bool {
        if !BLE_INTERACT_SUBSCRIBED.load(AtomicOrdering::Relaxed) {
            return false;
        }
        self.platform_notify(BLE_INTERACT_CHAR_HANDLE.load(AtomicOrdering::Relaxed), frame)
    }
}

#[cfg(not(target_os = "espidf"))]
impl TelemetryPort for BleAdapter {
    fn is_connected(&self) -> bool {
        self.sim_connected
    }

    fn notify_assessment(&mut self, frame: &[u8; ASSESSMENT_FRAME_LEN]) -> bool {
        if !self.sim_connected {
            return false;
        }
        self.sim_assessment_frames.push(*frame);
        true
    }

    fn notify_interaction(&mut self, frame: &[u8; INTERACTION_FRAME_LEN]) -> bool {
        if !self.sim_connected {
            return false;
        }
        self.sim_interaction_frames.push(*frame);
        true
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_adapter() -> BleAdapter {
        let mut name = heapless::String::<24>::new();
        name.push_str("CogniPet-test").ok();
        BleAdapter::new(name)
    }

    #[test]
    fn start_transitions_to_advertising() {
        let mut adapter = make_adapter();
        assert_eq!(adapter.state(), BleState::Idle);
        adapter.start();
        assert_eq!(adapter.state(), BleState::Advertising);
    }

    #[test]
    fn notify_skipped_when_disconnected() {
        let mut adapter = make_adapter();
        adapter.start();
        assert!(!adapter.is_connected());
        assert!(!adapter.notify_assessment(&[0u8; 32]));
        assert!(!adapter.notify_interaction(&[0u8; 16]));
        assert!(adapter.sim_assessment_frames.is_empty());
        assert!(adapter.sim_interaction_frames.is_empty());
    }

    #[test]
    fn notify_delivers_when_connected() {
        let mut adapter = make_adapter();
        adapter.start();
        adapter.sim_connected = true;

        let mut frame = [0u8; 32];
        frame[8] = 12;
        assert!(adapter.notify_assessment(&frame));
        assert_eq!(adapter.sim_assessment_frames.len(), 1);
        assert_eq!(adapter.sim_assessment_frames[0][8], 12);

        assert!(adapter.notify_interaction(&[0xABu8; 16]));
        assert_eq!(adapter.sim_interaction_frames.len(), 1);
    }

    #[test]
    fn readvertise_waits_out_the_disconnect_delay() {
        let mut adapter = make_adapter();
        adapter.start();
        adapter.sim_connected = true;

        adapter.sim_drop_link(10_000);
        assert_eq!(adapter.state(), BleState::Idle);

        adapter.poll(10_000 + READVERTISE_DELAY_MS - 25);
        assert_eq!(adapter.state(), BleState::Idle);

        adapter.poll(10_000 + READVERTISE_DELAY_MS);
        assert_eq!(adapter.state(), BleState::Advertising);
    }

    #[test]
    fn readvertise_delay_survives_uptime_wraparound() {
        let mut adapter = make_adapter();
        adapter.start();
        adapter.sim_drop_link(u32::MAX - 100);

        adapter.poll(u32::MAX - 1);
        assert_eq!(adapter.state(), BleState::Idle);

        adapter.poll((u32::MAX - 100).wrapping_add(READVERTISE_DELAY_MS));
        assert_eq!(adapter.state(), BleState::Advertising);
    }

    #[test]
    fn frames_preserved_in_order() {
        let mut adapter = make_adapter();
        adapter.start();
        adapter.sim_connected = true;
        for kind in 0..4u8 {
            let mut frame = [0u8; 16];
            frame[4] = kind;
            adapter.notify_interaction(&frame);
        }
        let kinds: Vec<u8> = adapter
            .sim_interaction_frames
            .iter()
            .map(|f| f[4])
            .collect();
        assert_eq!(kinds, vec![0, 1, 2, 3]);
    }
}
